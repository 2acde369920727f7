//! # Broadcast Hub
//!
//! Registry of live real-time connections and best-effort fan-out of
//! [`RealtimeEvent`]s to them.
//!
//! Each registration owns a bounded FIFO queue drained by its websocket task.
//! `publish` only ever does a non-blocking enqueue per peer: a full queue drops
//! that one delivery, a closed queue removes the registration. Socket writes
//! (and their timeout) happen in the per-connection task, never here, so one
//! slow or dead peer cannot stall delivery to the others.
//!
//! Ordering within a single connection follows publish order; nothing is
//! promised across connections.

use lib_core::dto::RealtimeEvent;
use lib_core::UserId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events buffered per connection before further deliveries to it are dropped.
pub const PEER_QUEUE_CAPACITY: usize = 64;

/// Longest a single websocket write may take before the peer is disconnected.
pub const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle identifying one live connection.
pub type ConnectionId = Uuid;

/// Which registrations an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every registered connection.
    All,
    /// Only connections registered for this user.
    User(UserId),
}

impl Audience {
    fn includes(&self, owner: Option<UserId>) -> bool {
        match self {
            Audience::All => true,
            Audience::User(id) => owner == Some(*id),
        }
    }
}

/// Receiving side of a registration.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    user_id: Option<UserId>,
    receiver: mpsc::Receiver<RealtimeEvent>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Next delivered event; `None` once the registration is gone and the queue drained.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<RealtimeEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome counts of one `publish` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
    pub disconnected: usize,
}

struct Registration {
    user_id: Option<UserId>,
    sender: mpsc::Sender<RealtimeEvent>,
}

/// Live connection registry with per-peer queues.
pub struct BroadcastHub {
    registrations: RwLock<HashMap<ConnectionId, Registration>>,
    queue_capacity: usize,
}

static GLOBAL_HUB: OnceLock<Arc<BroadcastHub>> = OnceLock::new();

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(PEER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Process-wide hub. Constructed on first call; later calls return the same instance.
    pub fn global() -> Arc<BroadcastHub> {
        GLOBAL_HUB
            .get_or_init(|| {
                info!("[HUB] Initializing process-wide broadcast hub");
                Arc::new(BroadcastHub::new())
            })
            .clone()
    }

    /// Admit a new live connection, optionally owned by a user.
    pub async fn register(&self, user_id: Option<UserId>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();

        let total = {
            let mut registrations = self.registrations.write().await;
            registrations.insert(id, Registration { user_id, sender });
            registrations.len()
        };

        info!(connection_id = %id, user_id = ?user_id, total, "[HUB] Connection registered");

        Subscription {
            id,
            user_id,
            receiver,
        }
    }

    /// Remove a connection. Unknown or already-removed ids are ignored.
    ///
    /// Returns whether a registration was actually removed.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.registrations.write().await.remove(&id).is_some();
        if removed {
            info!(connection_id = %id, "[HUB] Connection unregistered");
        } else {
            debug!(connection_id = %id, "[HUB] Unregister of unknown connection ignored");
        }
        removed
    }

    /// Fan an event out to every matching registration.
    pub async fn publish(&self, audience: Audience, event: RealtimeEvent) -> PublishReport {
        let targets: Vec<(ConnectionId, mpsc::Sender<RealtimeEvent>)> = {
            let registrations = self.registrations.read().await;
            registrations
                .iter()
                .filter(|(_, registration)| audience.includes(registration.user_id))
                .map(|(id, registration)| (*id, registration.sender.clone()))
                .collect()
        };

        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(connection_id = %id, "[HUB] Peer queue full, delivery dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.disconnected += 1;
                    closed.push(id);
                }
            }
        }

        if !closed.is_empty() {
            let mut registrations = self.registrations.write().await;
            for id in &closed {
                registrations.remove(id);
                debug!(connection_id = %id, "[HUB] Pruned closed connection");
            }
        }

        debug!(
            audience = ?audience,
            delivered = report.delivered,
            dropped = report.dropped,
            disconnected = report.disconnected,
            "[HUB] Event published"
        );

        report
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registrations.read().await.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
