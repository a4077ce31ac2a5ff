//! The per-connection client contract.
//!
//! A [`ClipboardClient`] wraps one connected peer.  The hub pushes values to
//! it with [`ClipboardClient::update`] and receives the peer's values through
//! the stream returned by [`ClipboardClient::subscribe`].
//!
//! # Last-known value
//!
//! Every client remembers the last value it sent to, or received from, its
//! peer.  `update` with that same value is a no-op: the peer already holds
//! it, so writing it again would only bounce it back and forth.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use clip_core::{ClientId, ClipboardValue, ProtocolError};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffer size of the inbound stream of a [`ChannelClient`].
const CHANNEL_CLIENT_CAPACITY: usize = 16;

/// Errors raised by a client while delivering a value to its peer.
///
/// Every variant is terminal for the client: the hub removes it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Writing to the peer's socket failed.
    #[error("write to {label} failed: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer did not accept the write within the configured deadline.
    #[error("write to {label} timed out after {timeout:?}")]
    WriteTimeout { label: String, timeout: Duration },

    /// The value could not be framed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client was closed or told to reject updates.
    #[error("client {0} is closed")]
    Closed(String),
}

/// A connected peer as seen by the hub.
///
/// Implementations must be cheap to share (`Arc<dyn ClipboardClient>`)
/// because the hub hands one reference to every broadcast task.
#[async_trait]
pub trait ClipboardClient: Send + Sync {
    /// Stable identity used for registry membership and removal.
    fn id(&self) -> ClientId;

    /// Human-readable name for log lines, usually the peer address.
    fn label(&self) -> String;

    /// The last value this client sent to or received from its peer.
    fn last_known(&self) -> ClipboardValue;

    /// Pushes `value` to the peer.
    ///
    /// Returns `Ok(())` without writing anything when `value` equals
    /// [`last_known`](Self::last_known).  On a successful write the value
    /// becomes the new last-known value.
    ///
    /// # Errors
    ///
    /// Any error is terminal for this client.
    async fn update(&self, value: ClipboardValue) -> Result<(), ClientError>;

    /// Takes the stream of values received from the peer.
    ///
    /// Returns `Some` exactly once; later calls return `None`.  The stream
    /// ends when the connection ends.
    fn subscribe(&self) -> Option<mpsc::Receiver<ClipboardValue>>;

    /// Tears down the connection to the peer.
    ///
    /// Called by the hub once the client has been removed.  Afterwards
    /// `update` fails and nothing more arrives on the subscriber stream.
    /// Calling it twice is harmless.
    async fn close(&self);
}

/// Locks a std mutex, recovering the data if a holder panicked.
///
/// None of the guarded values can be left half-updated, so a poisoned lock
/// still holds a usable value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe holder for a client's last-known value.
#[derive(Debug, Default)]
pub struct LastKnown(Mutex<ClipboardValue>);

impl LastKnown {
    pub fn get(&self) -> ClipboardValue {
        lock(&self.0).clone()
    }

    pub fn matches(&self, value: &ClipboardValue) -> bool {
        *lock(&self.0) == *value
    }

    pub fn record(&self, value: ClipboardValue) {
        *lock(&self.0) = value;
    }
}

// ── In-process client ─────────────────────────────────────────────────────────

/// A client whose "peer" is the code holding the `Arc<ChannelClient>`.
///
/// [`push`](Self::push) plays the part of the remote peer sending a value;
/// [`delivered`](Self::delivered) shows what the hub actually wrote to it.
/// Used by the tests and for embedding the relay in-process.
#[derive(Debug)]
pub struct ChannelClient {
    id: ClientId,
    label: String,
    last_known: LastKnown,
    outbound: Mutex<Option<mpsc::Sender<ClipboardValue>>>,
    inbound: Mutex<Option<mpsc::Receiver<ClipboardValue>>>,
    delivered: Mutex<Vec<ClipboardValue>>,
    update_calls: AtomicUsize,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl ChannelClient {
    pub fn new(label: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CLIENT_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            last_known: LastKnown::default(),
            outbound: Mutex::new(Some(tx)),
            inbound: Mutex::new(Some(rx)),
            delivered: Mutex::new(Vec::new()),
            update_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates the peer sending `value` to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] after [`disconnect`](Self::disconnect)
    /// or [`close`](ClipboardClient::close), or once nobody reads the stream
    /// any more.
    pub async fn push(&self, value: ClipboardValue) -> Result<(), ClientError> {
        let tx = lock(&self.outbound)
            .clone()
            .ok_or_else(|| ClientError::Closed(self.label.clone()))?;
        self.last_known.record(value.clone());
        tx.send(value)
            .await
            .map_err(|_| ClientError::Closed(self.label.clone()))
    }

    /// Ends the inbound stream, as a dropped connection would.
    pub fn disconnect(&self) {
        lock(&self.outbound).take();
    }

    /// Makes every further [`update`](ClipboardClient::update) fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Values actually written to this client, oldest first.
    pub fn delivered(&self) -> Vec<ClipboardValue> {
        lock(&self.delivered).clone()
    }

    /// Number of real (non-no-op) deliveries.
    pub fn delivery_count(&self) -> usize {
        lock(&self.delivered).len()
    }

    /// Number of times `update` was called, no-ops included.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// `true` once the hub has closed this client.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClipboardClient for ChannelClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn last_known(&self) -> ClipboardValue {
        self.last_known.get()
    }

    async fn update(&self, value: ClipboardValue) -> Result<(), ClientError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) || self.is_closed() {
            return Err(ClientError::Closed(self.label.clone()));
        }
        if self.last_known.matches(&value) {
            return Ok(());
        }
        lock(&self.delivered).push(value.clone());
        self.last_known.record(value);
        Ok(())
    }

    fn subscribe(&self) -> Option<mpsc::Receiver<ClipboardValue>> {
        lock(&self.inbound).take()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.disconnect();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
