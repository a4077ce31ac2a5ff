//! Infrastructure layer for the peer.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clip_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`clipboard`** – [`LocalClipboard`] implementations: the system
//!   clipboard through `arboard`, and an in-memory clipboard for tests.
//! - **`network`** – TCP connection to the relay: framing, automatic `Pong`
//!   replies and reconnection when the connection drops.
//!
//! [`LocalClipboard`]: crate::application::sync_clipboard::LocalClipboard

pub mod clipboard;
pub mod network;
