//! Event-driven container state cache
//!
//! One [`ContainerStore`] per host keeps a snapshot of that host's
//! containers. The snapshot is loaded once in the background, then kept
//! current from the engine event stream. When the stream drops, the next
//! [`ContainerStore::list`] resubscribes and re-lists.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dockhook_api::{Container, ContainerEvent, EventKind};
use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::client::Client;
use crate::error::CoreError;

/// Buffered engine events between the subscription and the event loop
const EVENT_BUFFER: usize = 64;

/// Which observer set a [`Subscription`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Events,
    NewContainers,
}

/// Handle returned by the subscribe calls, used to unsubscribe
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    kind: SubscriptionKind,
}

impl Subscription {
    #[must_use]
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }
}

/// Single-flight gate over the event subscription
///
/// Each connectivity window gets its own ID. Only the window that is
/// currently open can close the gate, so a late reset from an earlier
/// window cannot clear a newer one.
#[derive(Debug)]
struct ConnectivityGate {
    /// ID of the open window, 0 while disconnected
    open: AtomicU64,
    next: AtomicU64,
}

impl ConnectivityGate {
    fn new() -> Self {
        Self {
            open: AtomicU64::new(0),
            next: AtomicU64::new(1),
        }
    }

    /// Open a new window, `None` if one is already open
    fn try_open(&self) -> Option<u64> {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.open
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| id)
    }

    /// Close window `id`, returns `false` if it was no longer open
    fn close(&self, id: u64) -> bool {
        self.open
            .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) != 0
    }
}

struct Observer<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

struct StoreInner {
    client: Arc<Client>,
    containers: DashMap<String, Container>,
    subscribers: DashMap<u64, Observer<ContainerEvent>>,
    new_container_subscribers: DashMap<u64, Observer<Container>>,
    next_subscription: AtomicU64,
    /// Open while an event subscription is live
    gate: ConnectivityGate,
    /// Flips to `true` once the initial load has been attempted
    ready: watch::Sender<bool>,
    events_tx: mpsc::Sender<ContainerEvent>,
    shutdown: CancellationToken,
}

/// Container cache for a single host
pub struct ContainerStore {
    inner: Arc<StoreInner>,
}

impl ContainerStore {
    /// Create the store and start loading in the background
    ///
    /// The store stops when `parent` is cancelled or the store is dropped.
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(parent: &CancellationToken, client: Arc<Client>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (ready, _) = watch::channel(false);

        let inner = Arc::new(StoreInner {
            client,
            containers: DashMap::new(),
            subscribers: DashMap::new(),
            new_container_subscribers: DashMap::new(),
            next_subscription: AtomicU64::new(0),
            gate: ConnectivityGate::new(),
            ready,
            events_tx,
            shutdown: parent.child_token(),
        });

        tokio::spawn(run(Arc::clone(&inner), events_rx));

        Self { inner }
    }

    /// Current containers, sorted by name
    ///
    /// Waits for the initial load and resynchronizes first if the event
    /// subscription has dropped.
    ///
    /// # Errors
    /// Returns the listing error if a resynchronization fails
    pub async fn list(&self) -> Result<Vec<Container>, CoreError> {
        let mut ready = self.inner.ready.subscribe();
        ready
            .wait_for(|loaded| *loaded)
            .await
            .map_err(|_| CoreError::StoreClosed)?;

        self.inner.check_connectivity().await?;

        let mut containers: Vec<Container> = self
            .inner
            .containers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        containers.sort_by_key(|c| c.name.to_lowercase());

        Ok(containers)
    }

    /// Receive every container event until `cancel` fires
    pub fn subscribe(
        &self,
        tx: mpsc::Sender<ContainerEvent>,
        cancel: CancellationToken,
    ) -> Subscription {
        let id = self.inner.next_id();
        self.inner.subscribers.insert(id, Observer { tx, cancel });
        Subscription {
            id,
            kind: SubscriptionKind::Events,
        }
    }

    /// Receive containers as they start until `cancel` fires
    pub fn subscribe_new_containers(
        &self,
        tx: mpsc::Sender<Container>,
        cancel: CancellationToken,
    ) -> Subscription {
        let id = self.inner.next_id();
        self.inner
            .new_container_subscribers
            .insert(id, Observer { tx, cancel });
        Subscription {
            id,
            kind: SubscriptionKind::NewContainers,
        }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        match subscription.kind {
            SubscriptionKind::Events => {
                self.inner.subscribers.remove(&subscription.id);
            }
            SubscriptionKind::NewContainers => {
                self.inner
                    .new_container_subscribers
                    .remove(&subscription.id);
            }
        }
    }

    /// Number of registered observers of each kind
    #[must_use]
    pub fn subscriber_count(&self, kind: SubscriptionKind) -> usize {
        match kind {
            SubscriptionKind::Events => self.inner.subscribers.len(),
            SubscriptionKind::NewContainers => self.inner.new_container_subscribers.len(),
        }
    }

    /// Whether an event subscription is currently live
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.gate.is_open()
    }

    #[must_use]
    pub fn client(&self) -> &Arc<Client> {
        &self.inner.client
    }
}

impl Drop for ContainerStore {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl StoreInner {
    fn next_id(&self) -> u64 {
        self.next_subscription.fetch_add(1, Ordering::Relaxed)
    }

    fn host_id(&self) -> &str {
        &self.client.host().id
    }

    /// Subscribe and re-list unless a subscription is already live
    async fn check_connectivity(self: &Arc<Self>) -> Result<(), CoreError> {
        let Some(id) = self.gate.try_open() else {
            return Ok(());
        };

        let window = self.shutdown.child_token();
        tokio::spawn(subscribe_events(Arc::clone(self), id, window.clone()));

        match self.client.list_containers().await {
            Ok(containers) => {
                self.replace_all(containers);
                Ok(())
            }
            Err(e) => {
                window.cancel();
                self.gate.close(id);
                Err(e)
            }
        }
    }

    fn replace_all(&self, containers: Vec<Container>) {
        let mut ids = HashSet::with_capacity(containers.len());
        for container in containers {
            ids.insert(container.id.clone());
            self.containers.insert(container.id.clone(), container);
        }
        self.containers.retain(|id, _| ids.contains(id));

        debug!(host = %self.host_id(), count = ids.len(), "container cache loaded");
    }

    async fn apply(&self, event: &ContainerEvent) {
        match event.kind() {
            EventKind::Start => match self.client.find_container_by_id(&event.actor_id).await {
                Ok(container) => {
                    debug!(host = %self.host_id(), container = %container.id, "container started");
                    self.containers
                        .insert(container.id.clone(), container.clone());
                    fan_out(&self.new_container_subscribers, container).await;
                }
                Err(e) => {
                    debug!(container = %event.actor_id, error = %e, "started container not found");
                }
            },
            EventKind::Destroy => {
                debug!(host = %self.host_id(), container = %event.actor_id, "container destroyed");
                self.containers.remove(&event.actor_id);
            }
            EventKind::Die => {
                if let Some(mut container) = self.containers.get_mut(&event.actor_id) {
                    debug!(host = %self.host_id(), container = %event.actor_id, "container died");
                    container.state = "exited".to_string();
                }
            }
            EventKind::Health(status) => {
                if let Some(mut container) = self.containers.get_mut(&event.actor_id) {
                    debug!(
                        container = %event.actor_id,
                        health = status.as_str(),
                        "container health changed"
                    );
                    container.health = Some(status.as_str().to_string());
                }
            }
            EventKind::Other => {}
        }
    }
}

/// Event subscription for connectivity window `id`
async fn subscribe_events(inner: Arc<StoreInner>, id: u64, window: CancellationToken) {
    debug!(host = %inner.host_id(), window = id, "subscribing to engine events");

    let result = inner
        .client
        .events(window.clone(), inner.events_tx.clone())
        .await;

    if !inner.gate.close(id) || window.is_cancelled() {
        return;
    }

    match result {
        Ok(()) => debug!(host = %inner.host_id(), "event subscription ended"),
        Err(e) => error!(
            host = %inner.host_id(),
            error = %e,
            "store unexpectedly disconnected from engine events"
        ),
    }
}

/// Deliver `item` to every observer concurrently, dropping dead ones
async fn fan_out<T: Clone + Send>(observers: &DashMap<u64, Observer<T>>, item: T) {
    let snapshot: Vec<_> = observers
        .iter()
        .map(|entry| (*entry.key(), entry.tx.clone(), entry.cancel.clone()))
        .collect();

    let deliveries = snapshot.into_iter().map(|(id, tx, cancel)| {
        let item = item.clone();
        async move {
            let delivered = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                sent = tx.send(item) => sent.is_ok(),
            };
            (!delivered).then_some(id)
        }
    });

    for id in join_all(deliveries).await.into_iter().flatten() {
        trace!(subscription = id, "removing observer");
        observers.remove(&id);
    }
}

async fn run(inner: Arc<StoreInner>, mut events_rx: mpsc::Receiver<ContainerEvent>) {
    let stopped = tokio::select! {
        () = inner.shutdown.cancelled() => true,
        result = inner.check_connectivity() => {
            if let Err(e) = result {
                error!(host = %inner.host_id(), error = %e, "initial container load failed");
            }
            false
        }
    };
    inner.ready.send_replace(true);
    if stopped {
        return;
    }

    loop {
        let event = tokio::select! {
            () = inner.shutdown.cancelled() => break,
            event = events_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        trace!(event = ?event, "received event");
        inner.apply(&event).await;
        fan_out(&inner.subscribers, event).await;
    }

    debug!(host = %inner.host_id(), "container store stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_is_single_flight() {
        let gate = ConnectivityGate::new();
        assert!(!gate.is_open());

        let first = gate.try_open().unwrap();
        assert!(gate.is_open());
        assert!(gate.try_open().is_none());

        assert!(gate.close(first));
        assert!(!gate.is_open());
    }

    #[test]
    fn test_stale_window_cannot_close_newer_one() {
        let gate = ConnectivityGate::new();

        // A failed re-list closes the first window while its subscription
        // task is still unwinding
        let stale = gate.try_open().unwrap();
        assert!(gate.close(stale));
        let current = gate.try_open().unwrap();
        assert_ne!(stale, current);

        // The late reset from the first window is ignored
        assert!(!gate.close(stale));
        assert!(gate.is_open());
        assert!(gate.try_open().is_none());

        assert!(gate.close(current));
    }
}
