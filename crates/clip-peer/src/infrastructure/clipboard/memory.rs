//! In-memory clipboard for tests.
//!
//! Behaves like a system clipboard that only this process touches: `set`
//! stands in for the user copying something, and every `write` made by the
//! sync use case is counted so tests can tell a real write from a skipped
//! one.
//!
//! # Usage in tests
//!
//! ```ignore
//! let clipboard = Arc::new(MemoryClipboard::new());
//! let mut sync = SyncClipboardUseCase::new(clipboard.clone());
//!
//! clipboard.set(ClipboardValue::from_text("copied").unwrap());
//! assert!(sync.poll_local().is_some());
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use clip_core::ClipboardValue;

use crate::application::sync_clipboard::{ClipboardError, LocalClipboard};

/// A clipboard that lives in process memory.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Mutex<ClipboardValue>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content as if the user had copied `value`.
    pub fn set(&self, value: ClipboardValue) {
        *self.content() = value;
    }

    pub fn get(&self) -> ClipboardValue {
        self.content().clone()
    }

    /// Number of successful `write` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every further read and write fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn content(&self) -> MutexGuard<'_, ClipboardValue> {
        self.content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failing(&self) -> Result<(), ClipboardError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClipboardError::Backend("memory clipboard failure".into()));
        }
        Ok(())
    }
}

impl LocalClipboard for MemoryClipboard {
    fn read(&self) -> Result<ClipboardValue, ClipboardError> {
        self.check_failing()?;
        Ok(self.get())
    }

    fn write(&self, value: &ClipboardValue) -> Result<(), ClipboardError> {
        self.check_failing()?;
        self.set(value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clipboard_is_empty() {
        let clipboard = MemoryClipboard::new();
        assert!(clipboard.read().unwrap().is_empty());
        assert_eq!(clipboard.write_count(), 0);
    }

    #[test]
    fn test_write_replaces_content_and_counts() {
        // Arrange
        let clipboard = MemoryClipboard::new();
        let value = ClipboardValue::from_text("abc").unwrap();

        // Act
        clipboard.write(&value).unwrap();

        // Assert
        assert_eq!(clipboard.get(), value);
        assert_eq!(clipboard.write_count(), 1);
    }

    #[test]
    fn test_set_does_not_count_as_write() {
        let clipboard = MemoryClipboard::new();
        clipboard.set(ClipboardValue::from_text("user copy").unwrap());
        assert_eq!(clipboard.write_count(), 0);
    }

    #[test]
    fn test_failing_clipboard_rejects_reads_and_writes() {
        let clipboard = MemoryClipboard::new();
        clipboard.set_failing(true);

        assert!(clipboard.read().is_err());
        assert!(clipboard.write(&ClipboardValue::empty()).is_err());
        assert_eq!(clipboard.write_count(), 0);
    }
}
