//! Application layer use cases for the peer.
//!
//! - **`sync_clipboard`** – decides when a local clipboard change must be
//!   sent to the relay and applies values received from it.  The actual
//!   clipboard access goes through a [`LocalClipboard`] implementation that
//!   is injected at construction time.
//!
//! [`LocalClipboard`]: sync_clipboard::LocalClipboard

pub mod sync_clipboard;
