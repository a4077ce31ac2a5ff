//! # clip-core
//!
//! Shared library for clipshare containing the clipboard value type and the
//! network protocol codec.
//!
//! This crate is used by both the relay and the peer.  It has no
//! dependencies on sockets, async runtimes, or OS clipboard APIs.
//!
//! # Architecture overview
//!
//! clipshare keeps one logical clipboard in sync across machines.  Each
//! machine runs a *peer* that watches its local clipboard; every peer holds
//! a TCP connection to a central *relay*.  When a peer's clipboard changes it
//! sends the new value to the relay, which stores it and rebroadcasts it to
//! every other peer.
//!
//! This crate defines:
//!
//! - **`domain`** – [`ClipboardValue`], an immutable, size-capped payload
//!   that is cheap to clone, and the [`ClientId`] the relay assigns to each
//!   connection.
//!
//! - **`protocol`** – How bytes travel over the network.  Every message is a
//!   24-byte header followed by its payload, so a reader always knows how
//!   many bytes make up one complete value.

pub mod domain;
pub mod protocol;

pub use domain::value::{ClipboardValue, ValueError, MAX_CLIPBOARD_SIZE};
pub use domain::ClientId;
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::ClipMessage;
