//! Application layer of the relay.
//!
//! Everything here talks to peers only through the [`client::ClipboardClient`]
//! trait, so the broadcast logic runs unchanged against real sockets and
//! against in-process test clients.
//!
//! # Sub-modules
//!
//! - **`client`** – The per-connection adapter contract, its error type, and
//!   [`client::ChannelClient`], the in-process implementation.
//!
//! - **`hub`** – [`hub::ClipboardHub`], the single source of truth for the
//!   clipboard value and the set of live clients.  All updates are
//!   serialized through it.
//!
//! - **`router`** – One forwarding task per client that moves inbound values
//!   from the client's stream onto the hub's shared event channel.

pub mod client;
pub mod hub;
pub mod router;
