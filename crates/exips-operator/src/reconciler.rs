//! Reconciler
//!
//! On every tick: derive the desired address list from the registry, read the
//! published record, and replace it only when the two differ. A failed pass is
//! reported and retried on the next tick; there is no retry inside a pass.

use crate::error::ReconcileError;
use crate::observability::events;
use crate::publish::{PublishedRecord, Publisher};
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Name and namespace of the published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub namespace: String,
}

impl Target {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Result of one successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

pub struct Reconciler<P> {
    registry: Arc<Registry>,
    publisher: P,
    target: Target,
    interval: Duration,
}

impl<P: Publisher> Reconciler<P> {
    pub fn new(registry: Arc<Registry>, publisher: P, target: Target, interval: Duration) -> Self {
        Self {
            registry,
            publisher,
            target,
            interval,
        }
    }

    /// One pass: compute, compare, converge.
    #[instrument(skip(self), fields(name = %self.target.name, namespace = %self.target.namespace))]
    pub async fn reconcile_once(&self) -> Result<Outcome, ReconcileError> {
        let Target { name, namespace } = &self.target;
        let desired: Vec<String> = self
            .registry
            .external_ips()
            .await
            .iter()
            .map(ToString::to_string)
            .collect();

        let current = self
            .publisher
            .read(name, namespace)
            .await
            .map_err(ReconcileError::Read)?;

        let previous = match current {
            Some(record) if record.external_ips == desired => {
                events::record_unchanged(name, namespace, &desired);
                return Ok(Outcome::Unchanged);
            }
            Some(record) => Some(record.external_ips),
            None => None,
        };

        let record = PublishedRecord::new(name.as_str(), desired);
        self.publisher
            .write(&record, namespace)
            .await
            .map_err(ReconcileError::Write)?;

        match previous {
            Some(previous) => {
                events::record_updated(name, namespace, &previous, &record.external_ips);
                Ok(Outcome::Updated)
            }
            None => {
                events::record_created(name, namespace, &record.external_ips);
                Ok(Outcome::Created)
            }
        }
    }

    /// Ticks until cancelled. Passes run strictly one after another; a pass
    /// still in flight when cancellation arrives is abandoned.
    pub async fn run(self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            name = %self.target.name,
            namespace = %self.target.namespace,
            interval = ?self.interval,
            "Reconciler started"
        );

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;
                () = token.cancelled() => {
                    info!("Abandoning reconcile pass on shutdown");
                    break;
                }
                result = self.reconcile_once() => {
                    if let Err(e) = result {
                        events::reconcile_failed(&self.target.name, &self.target.namespace, &e);
                    }
                }
            }
        }

        info!("Reconciler stopped");
    }
}
