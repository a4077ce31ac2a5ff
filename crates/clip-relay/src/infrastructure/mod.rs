//! Infrastructure layer for the relay.
//!
//! Contains OS-facing adapters: the TCP listener, the socket-backed client,
//! and configuration file loading.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clip_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
