//! exips Operator Library
//!
//! Watches cluster nodes and keeps the external IPs of the eligible ones
//! published in the `externalIPs` of a selector-less Service, so an ingress
//! controller can advertise them.
//!
//! - `node`: read-only node views (live and static)
//! - `registry`: concurrency-safe node snapshot fed by the watch
//! - `policy`: eligibility filter and address selection
//! - `watch`: feeds the registry from a node watch stream
//! - `publish`: read/replace access to the published Service
//! - `reconciler`: periodic compare-and-converge loop

pub mod config;
pub mod error;
pub mod node;
pub mod observability;
pub mod policy;
pub mod publish;
pub mod reconciler;
pub mod registry;
pub mod watch;

pub use node::{KubeNode, NodeView, StaticNode};
pub use reconciler::{Outcome, Reconciler, Target};
pub use registry::{NodeEvent, Registry};
