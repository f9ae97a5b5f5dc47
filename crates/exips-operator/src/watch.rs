//! Watch feeder
//!
//! Drives a node watch stream and applies its events to the registry. The
//! first completed listing opens the sync gate; the reconciler must not start
//! before that, or it would publish a partial address list.

use crate::error::WatchError;
use crate::node::KubeNode;
use crate::observability::events;
use crate::registry::{NodeEvent, Registry, SharedNode};
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::watcher::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Creates a linked gate/waiter pair.
pub fn sync_gate() -> (SyncGate, SyncWaiter) {
    let (tx, rx) = watch::channel(false);
    (SyncGate { tx }, SyncWaiter { rx })
}

/// Held by the feeder; opened once the registry holds a full snapshot.
#[derive(Debug)]
pub struct SyncGate {
    tx: watch::Sender<bool>,
}

impl SyncGate {
    fn open(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct SyncWaiter {
    rx: watch::Receiver<bool>,
}

impl SyncWaiter {
    /// Resolves once the initial sync completed. Fails if the feeder stopped
    /// before that.
    pub async fn wait(&mut self) -> Result<(), WatchError> {
        self.rx
            .wait_for(|synced| *synced)
            .await
            .map(|_| ())
            .map_err(|_| WatchError::Stopped)
    }
}

/// Applies watch events to the registry.
///
/// `make_stream` opens a fresh watch. It is called once at start and again on
/// every resync, which forces a full re-list.
pub struct WatchFeeder<F> {
    registry: Arc<Registry>,
    make_stream: F,
    resync: Duration,
    gate: SyncGate,
    synced: bool,
    relist: Option<Vec<SharedNode>>,
}

impl<F, S, E> WatchFeeder<F>
where
    F: FnMut() -> S + Send,
    S: Stream<Item = Result<Event<Node>, E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new(registry: Arc<Registry>, make_stream: F, resync: Duration, gate: SyncGate) -> Self {
        Self {
            registry,
            make_stream,
            resync,
            gate,
            synced: false,
            relist: None,
        }
    }

    /// Runs until cancelled. Errors before the initial sync are fatal; later
    /// stream errors are logged and left to the watcher's backoff.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), WatchError> {
        let mut stream = Box::pin((self.make_stream)());
        let mut resync = tokio::time::interval_at(Instant::now() + self.resync, self.resync);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = token.cancelled() => {
                    info!("Node watch stopped");
                    return Ok(());
                }

                _ = resync.tick(), if self.synced => {
                    debug!("Resync: restarting node watch");
                    self.relist = None;
                    stream = Box::pin((self.make_stream)());
                }

                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        if self.handle(event).await {
                            resync.reset();
                        }
                    }
                    Some(Err(e)) if !self.synced => {
                        return Err(WatchError::InitialSync(Box::new(e)));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Node watch error, retrying");
                    }
                    None => return Err(WatchError::StreamEnded),
                }
            }
        }
    }

    /// Returns true when this event completed the initial sync.
    async fn handle(&mut self, event: Event<Node>) -> bool {
        match event {
            Event::Init => {
                debug!("Node listing started");
                self.relist = Some(Vec::new());
            }
            Event::InitApply(node) => {
                let Some(node) = wrap(node) else { return false };
                match self.relist.as_mut() {
                    Some(buffer) => buffer.push(node),
                    None => self.registry.upsert(node).await,
                }
            }
            Event::InitDone => {
                let nodes = self.relist.take().unwrap_or_default();
                self.registry.replace_all(nodes).await;
                if !self.synced {
                    self.synced = true;
                    self.gate.open();
                    events::registry_synced(self.registry.len().await);
                    return true;
                }
                debug!("Node listing refreshed");
            }
            Event::Apply(node) => {
                let Some(new) = wrap(node) else { return false };
                let event = match self.registry.get(new.name()).await {
                    Some(old) => NodeEvent::Updated { old, new },
                    None => NodeEvent::Added(new),
                };
                self.registry.apply(event).await;
            }
            Event::Delete(node) => {
                let Some(node) = wrap(node) else { return false };
                self.registry
                    .apply(NodeEvent::Deleted(node.name().to_string()))
                    .await;
            }
        }
        false
    }
}

fn wrap(node: Node) -> Option<SharedNode> {
    match KubeNode::new(node) {
        Some(node) => Some(Arc::new(node)),
        None => {
            warn!("Ignoring node event without a name");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Item = Result<Event<Node>, io::Error>;

    fn node(name: &str, ip: &str) -> Node {
        serde_json::from_value(json!({
            "metadata": { "name": name },
            "status": {
                "conditions": [{ "type": "Ready", "status": "True" }],
                "addresses": [{ "type": "ExternalIP", "address": ip }]
            }
        }))
        .unwrap()
    }

    fn listing(nodes: Vec<Node>) -> Vec<Item> {
        let mut events = vec![Ok(Event::Init)];
        events.extend(nodes.into_iter().map(|n| Ok(Event::InitApply(n))));
        events.push(Ok(Event::InitDone));
        events
    }

    /// A stream that yields the given events and then stays open, like a
    /// live watch.
    fn open_stream(events: Vec<Item>) -> impl Stream<Item = Item> + Send {
        stream::iter(events).chain(stream::pending())
    }

    async fn names(reg: &Registry) -> Vec<String> {
        reg.list()
            .await
            .iter()
            .map(|n| n.name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_initial_sync_opens_gate() {
        let registry = Arc::new(Registry::new());
        let (gate, mut waiter) = sync_gate();
        let mut events = listing(vec![node("b", "198.51.100.2"), node("a", "198.51.100.1")]);
        events.push(Ok(Event::Apply(node("c", "198.51.100.3"))));
        events.push(Ok(Event::Delete(node("a", "198.51.100.1"))));

        let mut pending = Some(events);
        let feeder = WatchFeeder::new(
            registry.clone(),
            move || open_stream(pending.take().unwrap_or_default()),
            Duration::from_secs(3600),
            gate,
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(feeder.run(token.clone()));

        waiter.wait().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while names(&registry).await != vec!["b", "c"] {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_error_before_sync_is_fatal() {
        let registry = Arc::new(Registry::new());
        let (gate, mut waiter) = sync_gate();
        let feeder = WatchFeeder::new(
            registry,
            || {
                open_stream(vec![
                    Ok(Event::Init),
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "forbidden")),
                ])
            },
            Duration::from_secs(3600),
            gate,
        );

        let result = feeder.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(WatchError::InitialSync(_))));
        assert!(matches!(waiter.wait().await, Err(WatchError::Stopped)));
    }

    #[tokio::test]
    async fn test_error_after_sync_is_tolerated() {
        let registry = Arc::new(Registry::new());
        let (gate, mut waiter) = sync_gate();
        let mut events = listing(vec![node("a", "198.51.100.1")]);
        events.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
        events.push(Ok(Event::Apply(node("b", "198.51.100.2"))));

        let mut pending = Some(events);
        let feeder = WatchFeeder::new(
            registry.clone(),
            move || open_stream(pending.take().unwrap_or_default()),
            Duration::from_secs(3600),
            gate,
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(feeder.run(token.clone()));

        waiter.wait().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.len().await < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stream_end_is_an_error() {
        let (gate, _waiter) = sync_gate();
        let feeder = WatchFeeder::new(
            Arc::new(Registry::new()),
            || stream::iter(listing(vec![])),
            Duration::from_secs(3600),
            gate,
        );
        let result = feeder.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(WatchError::StreamEnded)));
    }

    #[tokio::test]
    async fn test_cancel_before_sync() {
        let (gate, mut waiter) = sync_gate();
        let feeder = WatchFeeder::new(
            Arc::new(Registry::new()),
            || open_stream(vec![]),
            Duration::from_secs(3600),
            gate,
        );
        let token = CancellationToken::new();
        token.cancel();
        feeder.run(token).await.unwrap();
        assert!(matches!(waiter.wait().await, Err(WatchError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_relists_and_drops_stale_nodes() {
        let registry = Arc::new(Registry::new());
        let (gate, mut waiter) = sync_gate();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let feeder = WatchFeeder::new(
            registry.clone(),
            move || {
                let events = match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => listing(vec![node("a", "198.51.100.1"), node("gone", "198.51.100.9")]),
                    _ => listing(vec![node("a", "198.51.100.1"), node("new", "198.51.100.2")]),
                };
                open_stream(events)
            },
            Duration::from_secs(60),
            gate,
        );
        let token = CancellationToken::new();
        let handle = tokio::spawn(feeder.run(token.clone()));

        waiter.wait().await.unwrap();
        assert_eq!(names(&registry).await, vec!["a", "gone"]);

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while names(&registry).await != vec!["a", "new"] {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 2);

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
