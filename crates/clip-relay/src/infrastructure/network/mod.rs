//! Network infrastructure for the relay.
//!
//! # Sub-modules
//!
//! - **`listener`** – Binds the TCP port and accepts peers forever, turning
//!   each connection into a registered [`tcp_client::TcpClient`].
//!
//! - **`tcp_client`** – The [`ClipboardClient`](crate::application::client::ClipboardClient)
//!   implementation over a framed TCP stream.

pub mod listener;
pub mod tcp_client;
