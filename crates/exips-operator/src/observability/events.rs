//! Structured Events
//!
//! One function per operational event so field names stay consistent across
//! call sites. Every event carries an `event_type` field.
//!
//! Event types:
//! - `registry_synced` - initial node snapshot loaded
//! - `record_created` - published Service created
//! - `record_updated` - published Service address list replaced
//! - `record_unchanged` - published Service already matches
//! - `reconcile_failed` - a pass was aborted

use tracing::{debug, error, info};

pub fn registry_synced(node_count: usize) {
    info!(
        event_type = "registry_synced",
        node_count = node_count,
        "Node registry synced"
    );
}

pub fn record_created(name: &str, namespace: &str, ips: &[String]) {
    info!(
        event_type = "record_created",
        name = %name,
        namespace = %namespace,
        ips = ?ips,
        "Created service"
    );
}

pub fn record_updated(name: &str, namespace: &str, previous: &[String], ips: &[String]) {
    info!(
        event_type = "record_updated",
        name = %name,
        namespace = %namespace,
        previous = ?previous,
        ips = ?ips,
        "Updated service"
    );
}

pub fn record_unchanged(name: &str, namespace: &str, ips: &[String]) {
    debug!(
        event_type = "record_unchanged",
        name = %name,
        namespace = %namespace,
        ips = ?ips,
        "Service up to date"
    );
}

pub fn reconcile_failed(name: &str, namespace: &str, error: &dyn std::error::Error) {
    error!(
        event_type = "reconcile_failed",
        name = %name,
        namespace = %namespace,
        error = %error,
        "Reconcile failed"
    );
}
