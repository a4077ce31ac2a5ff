//! Classification of socket errors into transient and terminal.
//!
//! A transient error leaves the connection usable; the reader logs it and
//! tries again.  Anything else ends the connection.

use std::io;

/// Returns `true` for I/O errors after which the same read may be retried.
///
/// `Interrupted`, `WouldBlock`, and `TimedOut` are transient.  Closed,
/// reset, and every other kind are terminal.
pub fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
