//! The clipboard value entity.
//!
//! A [`ClipboardValue`] is an opaque, size-bounded byte payload.  It is never
//! patched in place: every change to a clipboard produces a brand-new value
//! that replaces the old one wholesale.
//!
//! # Cheap clones
//!
//! The bytes live behind an `Arc<[u8]>`, so cloning a value only bumps a
//! reference count.  The relay hands the same value to one task per connected
//! peer during a broadcast, and none of those tasks copy the payload.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Largest payload, in bytes, a single clipboard value may carry.
pub const MAX_CLIPBOARD_SIZE: usize = 100_000;

/// Number of characters kept by [`ClipboardValue::preview`].
const PREVIEW_CHARS: usize = 40;

/// Errors raised when constructing a [`ClipboardValue`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// The payload exceeds [`MAX_CLIPBOARD_SIZE`].
    #[error("clipboard value of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

/// An immutable clipboard payload.
///
/// Equality compares the bytes, not the allocation, so two values read from
/// different sources compare equal when their contents match.  This is what
/// the echo suppression in the relay relies on.
///
/// # Examples
///
/// ```rust
/// use clip_core::ClipboardValue;
///
/// let a = ClipboardValue::from_text("hello").unwrap();
/// let b = ClipboardValue::new(b"hello".to_vec()).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_text(), Some("hello"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClipboardValue(Arc<[u8]>);

impl ClipboardValue {
    /// Wraps `bytes` as a clipboard value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TooLarge`] if `bytes` is longer than
    /// [`MAX_CLIPBOARD_SIZE`].
    pub fn new(bytes: Vec<u8>) -> Result<Self, ValueError> {
        if bytes.len() > MAX_CLIPBOARD_SIZE {
            return Err(ValueError::TooLarge {
                size: bytes.len(),
                max: MAX_CLIPBOARD_SIZE,
            });
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// Builds a value from UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TooLarge`] if the encoded text is too long.
    pub fn from_text(text: &str) -> Result<Self, ValueError> {
        Self::new(text.as_bytes().to_vec())
    }

    /// The empty value every relay starts with.
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The payload as text, or `None` if it is not valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A short, quoted, lossy rendering of the payload for log lines.
    ///
    /// Long payloads are cut after a few dozen characters and marked with
    /// `…`, so logging a 100 KB clipboard never floods the output.
    pub fn preview(&self) -> String {
        let text = String::from_utf8_lossy(&self.0);
        let mut chars = text.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{head:?}…")
        } else {
            format!("{head:?}")
        }
    }
}

impl Default for ClipboardValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ClipboardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClipboardValue({} bytes, {})", self.len(), self.preview())
    }
}

impl fmt::Display for ClipboardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

impl TryFrom<&str> for ClipboardValue {
    type Error = ValueError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::from_text(text)
    }
}

impl TryFrom<Vec<u8>> for ClipboardValue {
    type Error = ValueError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
