//! Fan-in router: one forwarding task per registered client.
//!
//! The router drains a client's inbound stream onto the hub's single event
//! channel, tagging every value with the client it came from.  A slow or
//! silent peer therefore only ever blocks its own router task, never the
//! hub's loop or any other client.
//!
//! The event channel is bounded.  When it is full, `send` waits, which stops
//! this router from reading further values from its client.  Only the client
//! producing the burst is throttled.

use clip_core::{ClientId, ClipboardValue};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Work items consumed by the hub's serialized loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// `origin` sent a new clipboard value.
    Update {
        origin: ClientId,
        value: ClipboardValue,
    },
    /// `client`'s inbound stream ended; it should be removed.
    Closed { client: ClientId },
}

/// Spawns the forwarding task for one client.
///
/// The task ends when the client's stream ends, after sending
/// [`HubEvent::Closed`], or as soon as the hub's channel is gone.
pub fn spawn_router(
    origin: ClientId,
    label: String,
    mut stream: mpsc::Receiver<ClipboardValue>,
    events: mpsc::Sender<HubEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(value) = stream.recv().await {
            debug!(client = %label, value = %value, "forwarding inbound value");
            if events.send(HubEvent::Update { origin, value }).await.is_err() {
                debug!(client = %label, "hub channel closed; router exiting");
                return;
            }
        }

        info!(client = %label, "client stream ended");
        // Ignored: a closed channel means the hub is gone and removal is moot.
        let _ = events.send(HubEvent::Closed { client: origin }).await;
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
