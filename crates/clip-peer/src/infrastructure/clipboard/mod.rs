//! Local clipboard implementations.

pub mod memory;
pub mod system;
