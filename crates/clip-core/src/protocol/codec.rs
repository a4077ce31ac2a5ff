//! Binary codec for encoding and decoding clipshare protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][seq:8][timestamp_us:8][payload:N]
//! ```
//! Total header size: 24 bytes. All multi-byte integers are big-endian.
//!
//! Stream readers use [`decode_header`] on the first [`HEADER_SIZE`] bytes to
//! learn how much payload follows, then hand exactly that many bytes to
//! [`decode_payload`].  An oversize length is rejected by [`decode_header`],
//! before the reader allocates or reads anything for the payload.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::domain::value::{ClipboardValue, MAX_CLIPBOARD_SIZE};
use crate::protocol::messages::{
    ClipMessage, DisconnectReason, MessageHeader, MessageType, HEADER_SIZE, PROTOCOL_VERSION,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The encoded payload length field does not match the actual data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The header declares a payload larger than any valid message.
    #[error("declared payload of {declared} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { declared: usize, max: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`ClipMessage`] into a byte vector including the 24-byte header.
///
/// The sequence number is **not** set by this function; pass a value taken
/// from a [`crate::protocol::SequenceCounter`].
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the payload would not be
/// accepted by a decoder.
///
/// # Examples
///
/// ```rust
/// use clip_core::protocol::{decode_message, encode_message, ClipMessage};
///
/// let msg = ClipMessage::Ping(42);
/// let bytes = encode_message(&msg, 0, 0).unwrap();
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(
    msg: &ClipMessage,
    sequence_number: u64,
    timestamp_us: u64,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_len = payload_len(msg);
    if payload_len > MAX_CLIPBOARD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload_len,
            max: MAX_CLIPBOARD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_len);

    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&(payload_len as u32).to_be_bytes());
    buf.extend_from_slice(&sequence_number.to_be_bytes());
    buf.extend_from_slice(&timestamp_us.to_be_bytes());

    match msg {
        ClipMessage::ClipboardUpdate(value) => buf.extend_from_slice(value.as_bytes()),
        ClipMessage::Ping(token) | ClipMessage::Pong(token) => {
            buf.extend_from_slice(&token.to_be_bytes())
        }
        ClipMessage::Disconnect { reason } => buf.push(*reason as u8),
    }
    Ok(buf)
}

/// Encodes a [`ClipMessage`] using the current system time as the timestamp.
///
/// # Errors
///
/// See [`encode_message`].
pub fn encode_message_now(
    msg: &ClipMessage,
    sequence_number: u64,
) -> Result<Vec<u8>, ProtocolError> {
    encode_message(msg, sequence_number, now_us())
}

/// Parses and validates the 24-byte header at the start of `bytes`.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if fewer than [`HEADER_SIZE`] bytes
///   are available.
/// - [`ProtocolError::UnsupportedVersion`] / [`ProtocolError::UnknownMessageType`]
///   for unrecognised header bytes.
/// - [`ProtocolError::PayloadTooLarge`] if the declared payload length is
///   above [`MAX_CLIPBOARD_SIZE`].
pub fn decode_header(bytes: &[u8]) -> Result<MessageHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type_byte = bytes[1];
    let message_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    // bytes[2..4] are reserved and ignored on decode

    let payload_length = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if payload_length as usize > MAX_CLIPBOARD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload_length as usize,
            max: MAX_CLIPBOARD_SIZE,
        });
    }

    Ok(MessageHeader {
        version,
        message_type,
        payload_length,
        sequence_number: read_u64(bytes, 8)?,
        timestamp_us: read_u64(bytes, 16)?,
    })
}

/// Decodes the payload that follows a header previously returned by
/// [`decode_header`].
///
/// `payload` must be exactly `header.payload_length` bytes long.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the payload length disagrees with the header
/// or the payload bytes are malformed for the message type.
pub fn decode_payload(header: &MessageHeader, payload: &[u8]) -> Result<ClipMessage, ProtocolError> {
    let declared = header.payload_length as usize;
    if payload.len() != declared {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared,
            available: payload.len(),
        });
    }

    match header.message_type {
        MessageType::ClipboardUpdate => ClipboardValue::new(payload.to_vec())
            .map(ClipMessage::ClipboardUpdate)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string())),
        MessageType::Ping => read_u64(payload, 0).map(ClipMessage::Ping),
        MessageType::Pong => read_u64(payload, 0).map(ClipMessage::Pong),
        MessageType::Disconnect => {
            require_len(payload, 1, "Disconnect")?;
            let reason = DisconnectReason::try_from(payload[0]).map_err(|_| {
                ProtocolError::MalformedPayload(format!(
                    "unknown disconnect reason: {}",
                    payload[0]
                ))
            })?;
            Ok(ClipMessage::Disconnect { reason })
        }
    }
}

/// Decodes one [`ClipMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(ClipMessage, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let payload_len = header.payload_length as usize;

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let msg = decode_payload(&header, &bytes[HEADER_SIZE..total_needed])?;
    Ok((msg, total_needed))
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn payload_len(msg: &ClipMessage) -> usize {
    match msg {
        ClipMessage::ClipboardUpdate(value) => value.len(),
        ClipMessage::Ping(_) | ClipMessage::Pong(_) => 8,
        ClipMessage::Disconnect { .. } => 1,
    }
}

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    let end = offset + 8;
    let bytes: [u8; 8] = buf
        .get(offset..end)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::InsufficientData {
            needed: end,
            available: buf.len(),
        })?;
    Ok(u64::from_be_bytes(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
