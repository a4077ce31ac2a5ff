//! Network infrastructure for the peer.
//!
//! Handles the TCP connection to the relay and hands inbound clipboard
//! values to the application layer.
//!
//! Architecture:
//! - `RelayConnection` owns the write half of the current TCP stream.
//! - A background task connects, reads frames and forwards them as
//!   [`PeerEvent`]s on an `mpsc` channel.  When the connection drops it
//!   waits `reconnect_interval` and connects again.
//! - Reads are buffered: bytes are appended to a receive buffer and whole
//!   frames are taken off the front, so a transient read error never loses
//!   a partially received frame.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clip_core::protocol::{
    decode_header, decode_payload, encode_message_now, is_transient, DisconnectReason,
    SequenceCounter, HEADER_SIZE,
};
use clip_core::{ClipMessage, ClipboardValue, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tracing::{debug, error, info, warn};

/// Relay address used when none is configured.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:1337";

const EVENT_CHANNEL_CAPACITY: usize = 128;
const READ_CHUNK_SIZE: usize = 8 * 1024;
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Errors that can occur in the peer network layer.
#[derive(Debug, Error)]
pub enum PeerNetworkError {
    /// TCP connection to the relay failed.
    #[error("failed to connect to relay at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// There is no live connection to send on.
    #[error("not connected to the relay")]
    NotConnected,
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration for the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerConfig {
    /// `host:port` of the relay.
    pub relay_addr: String,
    /// How often the local clipboard is polled.
    pub poll_interval: Duration,
    /// Pause before reconnecting after the connection drops or fails.
    pub reconnect_interval: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay_addr: DEFAULT_RELAY_ADDR.to_string(),
            poll_interval: Duration::from_secs(1),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

/// Events emitted by the network layer to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// The TCP connection was established.
    Connected { relay_addr: SocketAddr },
    /// The relay pushed a new clipboard value.
    ValueReceived(ClipboardValue),
    /// The TCP connection was lost.
    Disconnected,
}

/// Manages the TCP connection from the peer to the relay.
pub struct RelayConnection {
    config: PeerConfig,
    write_half: Mutex<Option<OwnedWriteHalf>>,
    seq: SequenceCounter,
}

impl RelayConnection {
    /// Creates a new (not yet connected) `RelayConnection`.
    pub fn new(config: PeerConfig) -> Self {
        Self {
            config,
            write_half: Mutex::new(None),
            seq: SequenceCounter::new(),
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Starts the connect/read/reconnect loop in a background task.
    ///
    /// Returns the receiver for [`PeerEvent`]s.  The loop stops once
    /// `running` is cleared or the receiver is dropped.
    pub fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> mpsc::Receiver<PeerEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move { self.connect_loop(running, tx).await });
        rx
    }

    async fn connect_loop(&self, running: Arc<AtomicBool>, tx: mpsc::Sender<PeerEvent>) {
        while running.load(Ordering::Relaxed) {
            match self.connect().await {
                Ok((reader, relay_addr)) => {
                    info!("connected to relay at {relay_addr}");
                    if tx.send(PeerEvent::Connected { relay_addr }).await.is_err() {
                        break;
                    }

                    self.read_loop(reader, &tx).await;

                    self.write_half.lock().await.take();
                    if tx.send(PeerEvent::Disconnected).await.is_err() {
                        break;
                    }
                    info!(
                        "disconnected from relay; reconnecting in {:?}",
                        self.config.reconnect_interval
                    );
                }
                Err(e) => warn!("{e}"),
            }

            if running.load(Ordering::Relaxed) {
                time::sleep(self.config.reconnect_interval).await;
            }
        }
        debug!("relay connection loop stopped");
    }

    async fn connect(&self) -> Result<(OwnedReadHalf, SocketAddr), PeerNetworkError> {
        let stream = TcpStream::connect(&self.config.relay_addr)
            .await
            .map_err(|source| PeerNetworkError::ConnectFailed {
                addr: self.config.relay_addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }
        let relay_addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        *self.write_half.lock().await = Some(writer);
        Ok((reader, relay_addr))
    }

    /// Reads frames until the connection ends or the receiver goes away.
    async fn read_loop(&self, mut reader: OwnedReadHalf, tx: &mpsc::Sender<PeerEvent>) {
        let mut recv_buf: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE);
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    info!("relay closed the connection");
                    return;
                }
                Ok(n) => recv_buf.extend_from_slice(&chunk[..n]),
                Err(e) if is_transient(&e) => {
                    warn!("transient read error from relay: {e}; retrying");
                    time::sleep(TRANSIENT_RETRY_DELAY).await;
                    continue;
                }
                Err(e) => {
                    error!("read error on relay connection: {e}");
                    return;
                }
            }

            loop {
                match take_frame(&mut recv_buf) {
                    Ok(Some(msg)) => {
                        if !self.handle_message(msg, tx).await {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("invalid frame from relay: {e}");
                        return;
                    }
                }
            }
        }
    }

    /// Returns `false` when reading should stop.
    async fn handle_message(&self, msg: ClipMessage, tx: &mpsc::Sender<PeerEvent>) -> bool {
        match msg {
            ClipMessage::ClipboardUpdate(value) => {
                debug!("relay pushed {}", value.preview());
                tx.send(PeerEvent::ValueReceived(value)).await.is_ok()
            }
            ClipMessage::Ping(token) => {
                if let Err(e) = self.send_message(&ClipMessage::Pong(token)).await {
                    warn!("failed to answer ping: {e}");
                }
                true
            }
            ClipMessage::Pong(token) => {
                debug!("pong {token}");
                true
            }
            ClipMessage::Disconnect { reason } => {
                info!("relay sent disconnect: {reason:?}");
                false
            }
        }
    }

    /// Sends a local clipboard value to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`PeerNetworkError::NotConnected`] while no connection is up,
    /// or the underlying write error.
    pub async fn send_value(&self, value: &ClipboardValue) -> Result<(), PeerNetworkError> {
        self.send_message(&ClipMessage::ClipboardUpdate(value.clone()))
            .await
    }

    async fn send_message(&self, msg: &ClipMessage) -> Result<(), PeerNetworkError> {
        let bytes = encode_message_now(msg, self.seq.next())?;
        let mut guard = self.write_half.lock().await;
        let writer = guard.as_mut().ok_or(PeerNetworkError::NotConnected)?;
        writer.write_all(&bytes).await?;
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.write_half.lock().await.is_some()
    }

    /// Tells the relay this peer is leaving and closes the write half.
    pub async fn disconnect(&self) {
        let Some(mut writer) = self.write_half.lock().await.take() else {
            return;
        };
        let goodbye = ClipMessage::Disconnect {
            reason: DisconnectReason::UserInitiated,
        };
        match encode_message_now(&goodbye, self.seq.next()) {
            Ok(bytes) => {
                if let Err(e) = writer.write_all(&bytes).await {
                    debug!("could not send disconnect: {e}");
                }
            }
            Err(e) => error!("failed to encode disconnect: {e}"),
        }
        let _ = writer.shutdown().await;
    }
}

/// Removes one complete frame from the front of `buf`.
///
/// Returns `Ok(None)` if the buffer does not yet hold a whole frame.  An
/// oversized length is reported as soon as the header is available.
fn take_frame(buf: &mut Vec<u8>) -> Result<Option<ClipMessage>, ProtocolError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }
    let header = decode_header(&buf[..HEADER_SIZE])?;
    let end = HEADER_SIZE + header.payload_length as usize;
    if buf.len() < end {
        return Ok(None);
    }
    let msg = decode_payload(&header, &buf[HEADER_SIZE..end])?;
    buf.drain(..end);
    Ok(Some(msg))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
