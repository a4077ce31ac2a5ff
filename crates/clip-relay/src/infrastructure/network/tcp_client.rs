//! Socket-backed [`ClipboardClient`].
//!
//! Each accepted TCP connection becomes one `TcpClient`.  The stream is split:
//!
//! - A **reader task** owns the read half.  It decodes one frame at a time
//!   (24-byte header first, then exactly the declared payload) and forwards
//!   every received clipboard value to the subscriber stream.  It answers
//!   `Ping` with `Pong` itself.
//! - The **write half** sits behind an async mutex shared by the hub's
//!   `update` calls and the reader's `Pong` replies, so frames never
//!   interleave on the wire.
//!
//! # Failure semantics
//!
//! Any read error, framing error, or `Disconnect` frame ends the reader and
//! with it the subscriber stream.  A write error or a write that outlives
//! the configured timeout fails `update`.  Either way the hub drops the
//! client; nothing is retried here.
//!
//! When the hub removes the client it calls `close`, which shuts down and
//! drops the write half and aborts the reader, so the socket is released and
//! anything the peer sends afterwards is never read.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use clip_core::protocol::{
    decode_header, decode_payload, encode_message_now, ClipMessage, ProtocolError,
    SequenceCounter, HEADER_SIZE,
};
use clip_core::{ClientId, ClipboardValue};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::client::{lock, ClientError, ClipboardClient, LastKnown};

/// Buffer between the reader task and the router.
const INBOUND_CAPACITY: usize = 16;

/// Why the reader task stopped.
#[derive(Debug, Error)]
enum ReadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("bad frame: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Serializes frame writes to one peer.  `None` once shut down.
struct FrameWriter {
    half: Mutex<Option<OwnedWriteHalf>>,
    seq: SequenceCounter,
    write_timeout: Duration,
    label: String,
}

impl FrameWriter {
    async fn send(&self, msg: &ClipMessage) -> Result<(), ClientError> {
        let bytes = encode_message_now(msg, self.seq.next())?;
        let mut guard = self.half.lock().await;
        let half = guard
            .as_mut()
            .ok_or_else(|| ClientError::Closed(self.label.clone()))?;
        match timeout(self.write_timeout, half.write_all(&bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ClientError::Io {
                label: self.label.clone(),
                source,
            }),
            Err(_) => Err(ClientError::WriteTimeout {
                label: self.label.clone(),
                timeout: self.write_timeout,
            }),
        }
    }

    /// Sends FIN and drops the write half.  Later sends fail with `Closed`.
    async fn shutdown(&self) {
        if let Some(mut half) = self.half.lock().await.take() {
            if let Err(e) = half.shutdown().await {
                debug!(client = %self.label, "shutdown failed: {e}");
            }
        }
    }
}

/// A peer connected over TCP.
pub struct TcpClient {
    id: ClientId,
    peer_addr: SocketAddr,
    writer: Arc<FrameWriter>,
    last_known: Arc<LastKnown>,
    inbound: StdMutex<Option<mpsc::Receiver<ClipboardValue>>>,
    reader: JoinHandle<()>,
}

impl TcpClient {
    /// Wraps `stream` and starts its reader task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(stream: TcpStream, peer_addr: SocketAddr, write_timeout: Duration) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let label = peer_addr.to_string();
        let writer = Arc::new(FrameWriter {
            half: Mutex::new(Some(write_half)),
            seq: SequenceCounter::new(),
            write_timeout,
            label: label.clone(),
        });
        let last_known = Arc::new(LastKnown::default());
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);

        let reader = tokio::spawn(read_loop(
            read_half,
            Arc::clone(&writer),
            Arc::clone(&last_known),
            tx,
            label,
        ));

        Arc::new(Self {
            id: Uuid::new_v4(),
            peer_addr,
            writer,
            last_known,
            inbound: StdMutex::new(Some(rx)),
            reader,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

#[async_trait]
impl ClipboardClient for TcpClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn label(&self) -> String {
        self.peer_addr.to_string()
    }

    fn last_known(&self) -> ClipboardValue {
        self.last_known.get()
    }

    async fn update(&self, value: ClipboardValue) -> Result<(), ClientError> {
        if self.last_known.matches(&value) {
            return Ok(());
        }
        self.writer
            .send(&ClipMessage::ClipboardUpdate(value.clone()))
            .await?;
        self.last_known.record(value);
        Ok(())
    }

    fn subscribe(&self) -> Option<mpsc::Receiver<ClipboardValue>> {
        lock(&self.inbound).take()
    }

    async fn close(&self) {
        self.reader.abort();
        self.writer.shutdown().await;
        debug!(client = %self.peer_addr, "connection closed");
    }
}

// ── Reader task ───────────────────────────────────────────────────────────────

async fn read_loop(
    mut reader: OwnedReadHalf,
    writer: Arc<FrameWriter>,
    last_known: Arc<LastKnown>,
    tx: mpsc::Sender<ClipboardValue>,
    label: String,
) {
    loop {
        let msg = match read_frame(&mut reader).await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                info!(client = %label, "peer closed the connection");
                break;
            }
            Err(e) => {
                warn!(client = %label, "dropping connection: {e}");
                break;
            }
        };

        match msg {
            ClipMessage::ClipboardUpdate(value) => {
                debug!(client = %label, value = %value, "received clipboard update");
                last_known.record(value.clone());
                if tx.send(value).await.is_err() {
                    debug!(client = %label, "subscriber gone; reader exiting");
                    break;
                }
            }
            ClipMessage::Ping(token) => {
                if let Err(e) = writer.send(&ClipMessage::Pong(token)).await {
                    warn!(client = %label, "failed to answer ping: {e}");
                    break;
                }
            }
            ClipMessage::Pong(token) => debug!(client = %label, token, "pong"),
            ClipMessage::Disconnect { reason } => {
                info!(client = %label, ?reason, "peer disconnected");
                break;
            }
        }
    }
}

/// Reads exactly one frame.  Returns `Ok(None)` on a clean EOF between frames.
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Option<ClipMessage>, ReadError> {
    let mut header_buf = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    // Rejects oversize lengths before allocating the payload buffer.
    let header = decode_header(&header_buf)?;
    let mut payload = vec![0u8; header.payload_length as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(decode_payload(&header, &payload)?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clip_core::protocol::{decode_message, encode_message, DisconnectReason, MessageType};
    use clip_core::MAX_CLIPBOARD_SIZE;
    use tokio::net::TcpListener;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Returns a connected (relay-side client, raw peer socket) pair.
    async fn connected_pair() -> (Arc<TcpClient>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = TcpStream::connect(addr).await.unwrap();
        let (server_side, peer_addr) = listener.accept().await.unwrap();
        (TcpClient::spawn(server_side, peer_addr, TEST_TIMEOUT), peer)
    }

    async fn read_one(peer: &mut TcpStream) -> ClipMessage {
        let mut header = [0u8; HEADER_SIZE];
        peer.read_exact(&mut header).await.unwrap();
        let len = u32::from_be_bytes(header[4..8].try_into().unwrap()) as usize;
        let mut frame = header.to_vec();
        frame.resize(HEADER_SIZE + len, 0);
        peer.read_exact(&mut frame[HEADER_SIZE..]).await.unwrap();
        decode_message(&frame).unwrap().0
    }

    fn text(s: &str) -> ClipboardValue {
        ClipboardValue::from_text(s).unwrap()
    }

    #[tokio::test]
    async fn test_update_writes_one_clipboard_frame() {
        // Arrange
        let (client, mut peer) = connected_pair().await;

        // Act
        client.update(text("hello")).await.unwrap();

        // Assert
        assert_eq!(read_one(&mut peer).await, ClipMessage::ClipboardUpdate(text("hello")));
        assert_eq!(client.last_known(), text("hello"));
    }

    #[tokio::test]
    async fn test_received_value_is_streamed_and_recorded() {
        // Arrange
        let (client, mut peer) = connected_pair().await;
        let mut stream = client.subscribe().unwrap();
        let frame = encode_message(&ClipMessage::ClipboardUpdate(text("from-peer")), 0, 0).unwrap();

        // Act
        peer.write_all(&frame).await.unwrap();

        // Assert
        assert_eq!(stream.recv().await, Some(text("from-peer")));
        assert_eq!(client.last_known(), text("from-peer"));
    }

    #[tokio::test]
    async fn test_update_equal_to_received_value_writes_nothing() {
        // Arrange
        let (client, mut peer) = connected_pair().await;
        let mut stream = client.subscribe().unwrap();
        let frame = encode_message(&ClipMessage::ClipboardUpdate(text("v")), 0, 0).unwrap();
        peer.write_all(&frame).await.unwrap();
        stream.recv().await.unwrap();

        // Act – echo attempt followed by a real update
        client.update(text("v")).await.unwrap();
        client.update(text("w")).await.unwrap();

        // Assert – the first frame the peer sees is the real update
        assert_eq!(read_one(&mut peer).await, ClipMessage::ClipboardUpdate(text("w")));
    }

    #[tokio::test]
    async fn test_ping_is_answered_with_pong() {
        let (_client, mut peer) = connected_pair().await;
        let ping = encode_message(&ClipMessage::Ping(77), 0, 0).unwrap();

        peer.write_all(&ping).await.unwrap();

        assert_eq!(read_one(&mut peer).await, ClipMessage::Pong(77));
    }

    #[tokio::test]
    async fn test_stream_ends_on_peer_close() {
        let (client, peer) = connected_pair().await;
        let mut stream = client.subscribe().unwrap();

        drop(peer);

        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_stream_ends_on_disconnect_frame() {
        let (client, mut peer) = connected_pair().await;
        let mut stream = client.subscribe().unwrap();
        let bye = encode_message(
            &ClipMessage::Disconnect {
                reason: DisconnectReason::UserInitiated,
            },
            0,
            0,
        )
        .unwrap();

        peer.write_all(&bye).await.unwrap();

        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_oversize_header_ends_stream() {
        // Arrange – a header that declares more than the cap, and no payload
        let (client, mut peer) = connected_pair().await;
        let mut stream = client.subscribe().unwrap();
        let mut header = encode_message(&ClipMessage::ClipboardUpdate(ClipboardValue::empty()), 0, 0)
            .unwrap();
        header[1] = MessageType::ClipboardUpdate as u8;
        header[4..8].copy_from_slice(&((MAX_CLIPBOARD_SIZE as u32) + 1).to_be_bytes());

        // Act
        peer.write_all(&header).await.unwrap();

        // Assert
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_releases_socket_and_stops_reading() {
        // Arrange
        let (client, mut peer) = connected_pair().await;
        let mut stream = client.subscribe().unwrap();

        // Act
        client.close().await;

        // Assert – the peer sees end of stream
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(TEST_TIMEOUT, peer.read(&mut buf))
            .await
            .expect("peer should see the connection end")
            .unwrap_or(0);
        assert_eq!(n, 0);

        // Assert – frames sent afterwards never reach the subscriber
        let frame = encode_message(&ClipMessage::ClipboardUpdate(text("ghost")), 0, 0).unwrap();
        let _ = peer.write_all(&frame).await;
        assert_eq!(stream.recv().await, None);
        assert_eq!(client.last_known(), ClipboardValue::empty());
    }

    #[tokio::test]
    async fn test_update_after_close_fails() {
        let (client, _peer) = connected_pair().await;
        client.close().await;

        let result = client.update(text("late")).await;

        assert!(matches!(result, Err(ClientError::Closed(_))));
    }

    #[tokio::test]
    async fn test_label_is_peer_address() {
        let (client, peer) = connected_pair().await;
        assert_eq!(client.label(), peer.local_addr().unwrap().to_string());
        assert_eq!(client.peer_addr(), peer.local_addr().unwrap());
    }
}
