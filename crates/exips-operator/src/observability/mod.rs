//! Observability
//!
//! - `logging`: subscriber setup (text or JSON, `RUST_LOG` filtering)
//! - `events`: structured operational events with consistent fields

pub mod events;
pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
