//! Domain entities for clipshare.
//!
//! Pure types with no I/O: the clipboard value itself and the identifier the
//! relay assigns to each connected peer.

/// The clipboard payload entity.
///
/// See [`value::ClipboardValue`] for the main type.
pub mod value;

/// Unique identifier for a connected peer, derived from UUID v4.
///
/// Assigned by the relay when a connection is accepted.  A peer that
/// reconnects is a new client and receives a fresh id.
pub type ClientId = uuid::Uuid;
