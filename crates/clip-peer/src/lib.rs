//! clip-peer library entry point.
//!
//! The peer runs on every machine that takes part in clipboard sharing.  It
//! keeps a TCP connection to the relay and does two things in a loop:
//!
//! 1. Polls the local system clipboard.  When the content changed since the
//!    last value it saw, it sends the new value to the relay.
//! 2. Writes every value the relay pushes into the local clipboard, and
//!    remembers it so the next poll does not send it straight back.
//!
//! The binary in `main.rs` wires the two halves together; integration tests
//! use the same module tree through this crate.

/// Application layer: the clipboard sync use case and its clipboard seam.
pub mod application;

/// Infrastructure layer: system clipboard adapters and the relay connection.
pub mod infrastructure;
