//! SyncClipboardUseCase: keeps the local clipboard and the relay in step.
//!
//! The use case owns the peer's *last-known* value: the most recent value it
//! either sent to the relay or received from it.  A poll only produces a
//! value to send when the local clipboard differs from last-known, which is
//! what stops a value received from the relay from bouncing straight back.

use std::sync::Arc;

use clip_core::{ClipboardValue, ValueError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for local clipboard access.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The platform clipboard could not be opened, read or written.
    #[error("clipboard backend error: {0}")]
    Backend(String),
    /// The clipboard holds something other than text.
    #[error("clipboard does not contain text")]
    NoText,
    /// The value cannot be stored as text on this platform.
    #[error("value is not valid UTF-8 text")]
    NotText,
    /// The clipboard content is above the shared size limit.
    #[error(transparent)]
    TooLarge(#[from] ValueError),
}

/// Platform-agnostic access to the local clipboard.
///
/// Implementations live in the infrastructure layer.
#[cfg_attr(test, mockall::automock)]
pub trait LocalClipboard: Send + Sync {
    /// Reads the current clipboard content.
    fn read(&self) -> Result<ClipboardValue, ClipboardError>;

    /// Replaces the clipboard content with `value`.
    fn write(&self, value: &ClipboardValue) -> Result<(), ClipboardError>;
}

/// The Sync Clipboard use case.
pub struct SyncClipboardUseCase {
    clipboard: Arc<dyn LocalClipboard>,
    last_known: ClipboardValue,
}

impl SyncClipboardUseCase {
    /// Creates a use case with an empty last-known value, so the first poll
    /// shares whatever the local clipboard already holds.
    pub fn new(clipboard: Arc<dyn LocalClipboard>) -> Self {
        Self {
            clipboard,
            last_known: ClipboardValue::empty(),
        }
    }

    pub fn last_known(&self) -> &ClipboardValue {
        &self.last_known
    }

    /// Reads the local clipboard and returns the value to send, if any.
    ///
    /// Returns `None` when the content is unchanged, cannot be read, or is
    /// too large to share.  Read failures are retried on the next poll.
    pub fn poll_local(&mut self) -> Option<ClipboardValue> {
        let value = match self.clipboard.read() {
            Ok(value) => value,
            Err(e) => {
                debug!("local clipboard read skipped: {e}");
                return None;
            }
        };

        if value == self.last_known {
            return None;
        }
        info!("local clipboard changed to {}", value.preview());
        self.last_known = value.clone();
        Some(value)
    }

    /// Applies a value pushed by the relay to the local clipboard.
    ///
    /// The value becomes last-known before the write, so even a failed write
    /// never causes it to be sent back.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError`] if the local clipboard cannot be written.
    pub fn apply_remote(&mut self, value: ClipboardValue) -> Result<(), ClipboardError> {
        if value == self.last_known {
            debug!("remote value {} already current", value.preview());
            return Ok(());
        }
        self.last_known = value.clone();
        self.clipboard.write(&value)?;
        info!("set clipboard to {}", value.preview());
        Ok(())
    }

    /// Forgets that `value` was sent, so the next poll offers it again.
    ///
    /// Called when sending to the relay failed.  Does nothing if a newer
    /// value has been recorded since.
    pub fn mark_unsent(&mut self, value: &ClipboardValue) {
        if &self.last_known == value {
            warn!("{} was not delivered; will retry", value.preview());
            self.last_known = ClipboardValue::empty();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clip_core::MAX_CLIPBOARD_SIZE;
    use mockall::predicate::eq;

    fn text(s: &str) -> ClipboardValue {
        ClipboardValue::from_text(s).unwrap()
    }

    fn use_case(mock: MockLocalClipboard) -> SyncClipboardUseCase {
        SyncClipboardUseCase::new(Arc::new(mock))
    }

    #[test]
    fn test_poll_returns_changed_value_once() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_read().times(2).returning(|| Ok(text("hello")));
        let mut uc = use_case(mock);

        // Act
        let first = uc.poll_local();
        let second = uc.poll_local();

        // Assert
        assert_eq!(first, Some(text("hello")));
        assert_eq!(second, None, "unchanged content must not be resent");
        assert_eq!(uc.last_known(), &text("hello"));
    }

    #[test]
    fn test_poll_with_empty_clipboard_sends_nothing() {
        let mut mock = MockLocalClipboard::new();
        mock.expect_read().returning(|| Ok(ClipboardValue::empty()));
        let mut uc = use_case(mock);

        assert_eq!(uc.poll_local(), None);
    }

    #[test]
    fn test_poll_skips_read_errors() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_read()
            .returning(|| Err(ClipboardError::Backend("busy".to_string())));
        let mut uc = use_case(mock);

        // Act / Assert
        assert_eq!(uc.poll_local(), None);
        assert!(uc.last_known().is_empty());
    }

    #[test]
    fn test_poll_skips_oversized_content() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_read().returning(|| {
            Err(ClipboardError::TooLarge(ValueError::TooLarge {
                size: MAX_CLIPBOARD_SIZE + 1,
                max: MAX_CLIPBOARD_SIZE,
            }))
        });
        let mut uc = use_case(mock);

        // Act / Assert
        assert_eq!(uc.poll_local(), None);
    }

    #[test]
    fn test_apply_remote_writes_and_suppresses_echo() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_write()
            .with(eq(text("remote")))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_read().returning(|| Ok(text("remote")));
        let mut uc = use_case(mock);

        // Act
        uc.apply_remote(text("remote")).unwrap();

        // Assert – the next poll sees the written value and sends nothing.
        assert_eq!(uc.poll_local(), None);
    }

    #[test]
    fn test_apply_remote_skips_write_when_already_current() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_read().returning(|| Ok(text("same")));
        mock.expect_write().times(0);
        let mut uc = use_case(mock);
        uc.poll_local();

        // Act / Assert
        assert!(uc.apply_remote(text("same")).is_ok());
    }

    #[test]
    fn test_apply_remote_failure_still_records_value() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_write()
            .returning(|_| Err(ClipboardError::Backend("locked".to_string())));
        let mut uc = use_case(mock);

        // Act
        let result = uc.apply_remote(text("incoming"));

        // Assert
        assert!(matches!(result, Err(ClipboardError::Backend(_))));
        assert_eq!(uc.last_known(), &text("incoming"));
    }

    #[test]
    fn test_mark_unsent_makes_value_eligible_again() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_read().returning(|| Ok(text("pending")));
        let mut uc = use_case(mock);
        let sent = uc.poll_local().unwrap();

        // Act
        uc.mark_unsent(&sent);

        // Assert
        assert_eq!(uc.poll_local(), Some(text("pending")));
    }

    #[test]
    fn test_mark_unsent_ignores_stale_value() {
        // Arrange
        let mut mock = MockLocalClipboard::new();
        mock.expect_write().returning(|_| Ok(()));
        let mut uc = use_case(mock);
        uc.apply_remote(text("newer")).unwrap();

        // Act
        uc.mark_unsent(&text("older"));

        // Assert
        assert_eq!(uc.last_known(), &text("newer"));
    }
}
