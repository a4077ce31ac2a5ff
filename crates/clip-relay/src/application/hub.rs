//! ClipboardHub: the relay's single source of truth.
//!
//! The hub owns the current clipboard value and the set of live clients.
//! Both sit behind one async mutex, and every mutation goes through it:
//!
//! ```text
//!  client A ─► router A ─┐
//!  client B ─► router B ─┼─► event channel ─► run()/step() ─► set_clipboard()
//!  client C ─► router C ─┘                                    │
//!                                 ┌───────────────────────────┘
//!                                 ▼
//!                fan-out: one task per client, joined before returning
//! ```
//!
//! # Ordering
//!
//! The lock is held from the equality check through the fan-out join, so
//! broadcast N has been fully delivered (or has evicted its failing clients)
//! before broadcast N+1 starts.  Every client sees values in the order the
//! hub applied them.
//!
//! # Echo suppression
//!
//! Updates carry the id of the client they came from.  The fan-out skips
//! that client while it still holds the value.  It is only written to if it
//! has since received something else, which happens when two peers change
//! their clipboards at nearly the same moment; that write is what brings the
//! origin back in line with everyone else.  Each client additionally ignores
//! values equal to its own last-known value.
//!
//! # Removal
//!
//! Clients whose delivery fails are collected during the fan-out and removed
//! by id after the join, never while the client map is being iterated.
//! Removal is terminal: the client's router is aborted and the client is
//! closed, so its connection goes away with it.  A value whose origin is no
//! longer registered is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use clip_core::{ClientId, ClipboardValue};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::client::{lock, ClientError, ClipboardClient};
use crate::application::router::spawn_router;

pub use crate::application::router::HubEvent;

/// Default bound of the shared inbound event channel.
pub const DEFAULT_INBOUND_QUEUE_CAPACITY: usize = 64;

/// Default number of client writes allowed in flight during one broadcast.
pub const DEFAULT_MAX_CONCURRENT_UPDATES: usize = 256;

/// Errors returned by [`ClipboardHub`] operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// The client's inbound stream was already taken by someone else.
    #[error("client {0} has already been subscribed")]
    AlreadySubscribed(ClientId),

    /// Pushing the current value to a newly registered client failed.
    #[error("initial update to client {label} failed: {source}")]
    InitialUpdate {
        label: String,
        #[source]
        source: ClientError,
    },

    /// [`ClipboardHub::close`] was called; no new clients are accepted.
    #[error("hub is shutting down")]
    ShuttingDown,

    /// Every sender of the inbound channel is gone.
    #[error("inbound update channel closed")]
    ChannelClosed,
}

/// Tuning knobs for a [`ClipboardHub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Bound of the shared inbound event channel.
    pub inbound_queue_capacity: usize,
    /// Maximum client writes in flight during one broadcast.
    pub max_concurrent_updates: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            inbound_queue_capacity: DEFAULT_INBOUND_QUEUE_CAPACITY,
            max_concurrent_updates: DEFAULT_MAX_CONCURRENT_UPDATES,
        }
    }
}

/// Outcome of one [`ClipboardHub::set_clipboard`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// `true` if the value replaced the hub's state.  `false` means it was
    /// equal to the current value and nothing was sent.
    pub applied: bool,
    /// Clients whose `update` returned `Ok`, no-ops included.
    pub delivered: usize,
    /// Clients removed because their `update` failed or panicked.
    pub removed: Vec<ClientId>,
}

/// A live client together with the task forwarding its values.
struct Registered {
    client: Arc<dyn ClipboardClient>,
    router: JoinHandle<()>,
}

impl Registered {
    /// Stops the router first so nothing more is forwarded, then closes the
    /// client.
    async fn retire(self) {
        self.router.abort();
        self.client.close().await;
    }
}

struct HubState {
    clipboard: ClipboardValue,
    clients: HashMap<ClientId, Registered>,
}

/// The relay's broadcast core.
///
/// Share it as `Arc<ClipboardHub>`: the accept loop calls
/// [`add_client`](Self::add_client) while a single task drives
/// [`run`](Self::run).
pub struct ClipboardHub {
    state: Mutex<HubState>,
    events_tx: StdMutex<Option<mpsc::Sender<HubEvent>>>,
    events_rx: Mutex<mpsc::Receiver<HubEvent>>,
    update_permits: Arc<Semaphore>,
}

impl ClipboardHub {
    /// Creates a hub holding the empty value and no clients.
    ///
    /// Zero-valued limits are raised to 1.
    pub fn new(config: HubConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.inbound_queue_capacity.max(1));
        Self {
            state: Mutex::new(HubState {
                clipboard: ClipboardValue::empty(),
                clients: HashMap::new(),
            }),
            events_tx: StdMutex::new(Some(tx)),
            events_rx: Mutex::new(rx),
            update_permits: Arc::new(Semaphore::new(config.max_concurrent_updates.max(1))),
        }
    }

    /// Registers `client`, starts its router, and sends it the current value.
    ///
    /// All three steps happen under the same lock as
    /// [`set_clipboard`](Self::set_clipboard), so a broadcast can never slip
    /// in between registration and the initial push.
    ///
    /// # Errors
    ///
    /// - [`HubError::ShuttingDown`] after [`close`](Self::close).
    /// - [`HubError::AlreadySubscribed`] if the client's stream was taken.
    /// - [`HubError::InitialUpdate`] if the initial push fails; the client
    ///   is removed again and its router stopped.
    pub async fn add_client(&self, client: Arc<dyn ClipboardClient>) -> Result<(), HubError> {
        let id = client.id();
        let label = client.label();
        let events = lock(&self.events_tx)
            .clone()
            .ok_or(HubError::ShuttingDown)?;
        let stream = client.subscribe().ok_or(HubError::AlreadySubscribed(id))?;

        let mut state = self.state.lock().await;
        let router = spawn_router(id, label.clone(), stream, events);
        state.clients.insert(
            id,
            Registered {
                client: Arc::clone(&client),
                router,
            },
        );

        if let Err(source) = client.update(state.clipboard.clone()).await {
            if let Some(entry) = state.clients.remove(&id) {
                entry.retire().await;
            }
            warn!(client = %label, "initial update failed: {source}");
            return Err(HubError::InitialUpdate { label, source });
        }

        info!(
            client = %label,
            clients = state.clients.len(),
            "client registered"
        );
        Ok(())
    }

    /// Replaces the clipboard with `value` and broadcasts it.
    ///
    /// `origin` is the client the value came from, or `None` when it was set
    /// locally.  A value equal to the current one is ignored, and so is a
    /// value from an origin that has already been removed.
    pub async fn set_clipboard(
        &self,
        value: ClipboardValue,
        origin: Option<ClientId>,
    ) -> BroadcastReport {
        let mut state = self.state.lock().await;
        if let Some(origin) = origin {
            if !state.clients.contains_key(&origin) {
                debug!(%origin, "update from a removed client; dropping");
                return BroadcastReport::default();
            }
        }
        if state.clipboard == value {
            debug!(value = %value, "value unchanged; skipping broadcast");
            return BroadcastReport::default();
        }
        state.clipboard = value.clone();
        info!(
            value = %value,
            bytes = value.len(),
            clients = state.clients.len(),
            "clipboard updated"
        );

        let mut tasks: Vec<(ClientId, String, JoinHandle<Result<(), ClientError>>)> =
            Vec::with_capacity(state.clients.len());
        for (&id, entry) in &state.clients {
            if Some(id) == origin && entry.client.last_known() == value {
                continue;
            }
            let client = Arc::clone(&entry.client);
            let value = value.clone();
            let permits = Arc::clone(&self.update_permits);
            let label = client.label();
            tasks.push((
                id,
                label,
                tokio::spawn(async move {
                    // The semaphore is never closed, so `acquire` cannot fail.
                    let _permit = permits.acquire_owned().await.ok();
                    client.update(value).await
                }),
            ));
        }

        let mut report = BroadcastReport {
            applied: true,
            ..BroadcastReport::default()
        };
        for (id, label, task) in tasks {
            match task.await {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(client = %label, "update failed: {e}");
                    report.removed.push(id);
                }
                Err(e) => {
                    error!(client = %label, "update task panicked: {e}");
                    report.removed.push(id);
                }
            }
        }

        for id in &report.removed {
            if let Some(entry) = state.clients.remove(id) {
                info!(client = %entry.client.label(), "client removed after failed update");
                entry.retire().await;
            }
        }
        report
    }

    /// Consumes exactly one event from the inbound channel and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ChannelClosed`] once the channel is closed and
    /// drained.
    pub async fn step(&self) -> Result<(), HubError> {
        let event = self
            .events_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(HubError::ChannelClosed)?;

        match event {
            HubEvent::Update { origin, value } => {
                self.set_clipboard(value, Some(origin)).await;
            }
            HubEvent::Closed { client } => {
                self.remove_client(client).await;
            }
        }
        Ok(())
    }

    /// Runs the hub's control loop until the inbound channel closes.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`step`](Self::step) other than the
    /// channel closing after [`close`](Self::close).
    pub async fn run(&self) -> Result<(), HubError> {
        loop {
            match self.step().await {
                Ok(()) => {}
                Err(HubError::ChannelClosed) => {
                    info!("inbound channel closed; hub stopped");
                    return Ok(());
                }
                Err(e) => {
                    error!("hub loop failed: {e}");
                    return Err(e);
                }
            }
        }
    }

    /// Stops accepting clients and drops the hub's own channel sender.
    ///
    /// [`run`](Self::run) returns once every router has exited too.
    pub fn close(&self) {
        if lock(&self.events_tx).take().is_some() {
            info!("hub closed to new clients");
        }
    }

    /// Removes `id` from the client set and closes it.  Returns `false` if
    /// it was absent.
    pub async fn remove_client(&self, id: ClientId) -> bool {
        let mut state = self.state.lock().await;
        match state.clients.remove(&id) {
            Some(entry) => {
                info!(
                    client = %entry.client.label(),
                    clients = state.clients.len(),
                    "client removed"
                );
                entry.retire().await;
                true
            }
            None => false,
        }
    }

    /// The current clipboard value.
    pub async fn clipboard(&self) -> ClipboardValue {
        self.state.lock().await.clipboard.clone()
    }

    /// Number of registered clients.
    pub async fn client_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    /// Ids of the registered clients, in no particular order.
    pub async fn client_ids(&self) -> Vec<ClientId> {
        self.state.lock().await.clients.keys().copied().collect()
    }
}

impl Default for ClipboardHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
