//! Published state
//!
//! The reconciler only needs two things from the store holding the published
//! address list: read the current record, and replace it wholesale.

mod service;

pub use service::{service_manifest, KubeServicePublisher, FIELD_MANAGER};

use crate::error::PublishError;
use async_trait::async_trait;

/// The record whose address list is kept in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub name: String,
    pub external_ips: Vec<String>,
}

impl PublishedRecord {
    pub fn new(name: impl Into<String>, external_ips: Vec<String>) -> Self {
        Self {
            name: name.into(),
            external_ips,
        }
    }
}

/// Read/replace access to published records.
///
/// `write` must be idempotent: writing the same record twice leaves the same
/// state as writing it once.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Returns `None` when the record does not exist.
    async fn read(&self, name: &str, namespace: &str)
        -> Result<Option<PublishedRecord>, PublishError>;

    async fn write(&self, record: &PublishedRecord, namespace: &str) -> Result<(), PublishError>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    async fn read(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PublishedRecord>, PublishError> {
        (**self).read(name, namespace).await
    }

    async fn write(&self, record: &PublishedRecord, namespace: &str) -> Result<(), PublishError> {
        (**self).write(record, namespace).await
    }
}
