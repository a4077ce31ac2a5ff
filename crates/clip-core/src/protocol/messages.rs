//! All clipshare protocol message types.
//!
//! The protocol is deliberately small: a peer and the relay only ever
//! exchange whole clipboard values, keep-alive probes, and a goodbye.

use serde::{Deserialize, Serialize};

use crate::domain::value::ClipboardValue;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common message header in bytes.
pub const HEADER_SIZE: usize = 24;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes understood by the relay and peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    ClipboardUpdate = 0x01,
    Ping = 0x02,
    Pong = 0x03,
    Disconnect = 0x04,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::ClipboardUpdate),
            0x02 => Ok(MessageType::Ping),
            0x03 => Ok(MessageType::Pong),
            0x04 => Ok(MessageType::Disconnect),
            _ => Err(()),
        }
    }
}

// ── Common message header ─────────────────────────────────────────────────────

/// 24-byte header prepended to every message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Protocol version; always [`PROTOCOL_VERSION`].
    pub version: u8,
    /// Identifies the payload type.
    pub message_type: MessageType,
    /// Length of the payload in bytes (not including this header).
    pub payload_length: u32,
    /// Monotonically increasing per-connection counter.
    pub sequence_number: u64,
    /// Microseconds since Unix epoch at time of generation.
    pub timestamp_us: u64,
}

/// Reason for a graceful disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DisconnectReason {
    UserInitiated = 0x01,
    ServerShutdown = 0x02,
    ProtocolError = 0x03,
    Timeout = 0x04,
}

impl TryFrom<u8> for DisconnectReason {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(DisconnectReason::UserInitiated),
            0x02 => Ok(DisconnectReason::ServerShutdown),
            0x03 => Ok(DisconnectReason::ProtocolError),
            0x04 => Ok(DisconnectReason::Timeout),
            _ => Err(()),
        }
    }
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid clipshare messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipMessage {
    /// A complete replacement clipboard value.  Sent by a peer when its local
    /// clipboard changes and by the relay when broadcasting.
    ClipboardUpdate(ClipboardValue),
    /// Keep-alive probe carrying an opaque token.
    Ping(u64),
    /// Reply to a [`ClipMessage::Ping`], echoing its token.
    Pong(u64),
    /// Graceful close; the sender will write nothing further.
    Disconnect { reason: DisconnectReason },
}

impl ClipMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            ClipMessage::ClipboardUpdate(_) => MessageType::ClipboardUpdate,
            ClipMessage::Ping(_) => MessageType::Ping,
            ClipMessage::Pong(_) => MessageType::Pong,
            ClipMessage::Disconnect { .. } => MessageType::Disconnect,
        }
    }
}
