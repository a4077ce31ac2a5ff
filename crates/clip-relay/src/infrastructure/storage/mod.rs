//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the relay's TOML file, falling back to
//! built-in defaults when the file does not exist.

pub mod config;
