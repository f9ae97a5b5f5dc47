//! Node registry
//!
//! Concurrency-safe map from node name to the latest node view. The watch
//! feeder is the only writer; the reconciler reads snapshots. Views are
//! swapped as whole `Arc`s so a reader never sees a mix of two generations.

use crate::node::NodeView;
use crate::policy;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

pub type SharedNode = Arc<dyn NodeView>;

/// A change delivered by the watch source.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Added(SharedNode),
    Updated { old: SharedNode, new: SharedNode },
    Deleted(String),
}

#[derive(Debug, Default)]
pub struct Registry {
    nodes: RwLock<BTreeMap<String, SharedNode>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry keyed by the view's name.
    pub async fn upsert(&self, node: SharedNode) {
        let name = node.name().to_string();
        let previous = self.nodes.write().await.insert(name.clone(), node);
        trace!(node = %name, replaced = previous.is_some(), "Upserted node");
    }

    /// Removes a node. Removing an unknown name is a no-op.
    pub async fn remove(&self, name: &str) {
        if self.nodes.write().await.remove(name).is_some() {
            debug!(node = %name, "Removed node from registry");
        }
    }

    pub async fn get(&self, name: &str) -> Option<SharedNode> {
        self.nodes.read().await.get(name).cloned()
    }

    /// All nodes ordered by name ascending.
    pub async fn list(&self) -> Vec<SharedNode> {
        self.nodes.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Swaps the full contents in one critical section. Used after a re-list,
    /// where nodes deleted during a watch gap never produce a delete event.
    pub async fn replace_all(&self, nodes: impl IntoIterator<Item = SharedNode>) {
        let fresh: BTreeMap<String, SharedNode> = nodes
            .into_iter()
            .map(|n| (n.name().to_string(), n))
            .collect();
        let count = fresh.len();
        let previous = std::mem::replace(&mut *self.nodes.write().await, fresh);
        debug!(
            previous_count = previous.len(),
            node_count = count,
            "Replaced registry contents"
        );
    }

    /// Applies one watch event. Names are stable, so an update only looks at
    /// the new object.
    pub async fn apply(&self, event: NodeEvent) {
        match event {
            NodeEvent::Added(node) => self.upsert(node).await,
            NodeEvent::Updated { new, .. } => self.upsert(new).await,
            NodeEvent::Deleted(name) => self.remove(&name).await,
        }
    }

    /// External IPs of the eligible nodes in the current snapshot.
    pub async fn external_ips(&self) -> Vec<IpAddr> {
        policy::external_ips(&self.list().await)
    }
}
