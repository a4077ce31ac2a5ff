//! System clipboard backed by `arboard`.
//!
//! Only text is shared.  A fresh `arboard::Clipboard` handle is opened for
//! every call; holding one open for the lifetime of the process keeps the
//! clipboard locked on some platforms.

use clip_core::ClipboardValue;

use crate::application::sync_clipboard::{ClipboardError, LocalClipboard};

/// [`LocalClipboard`] over the operating system clipboard.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if the platform clipboard can be opened at all.
    pub fn is_available() -> bool {
        arboard::Clipboard::new().is_ok()
    }
}

fn backend_error(e: arboard::Error) -> ClipboardError {
    match e {
        arboard::Error::ContentNotAvailable => ClipboardError::NoText,
        other => ClipboardError::Backend(other.to_string()),
    }
}

impl LocalClipboard for SystemClipboard {
    fn read(&self) -> Result<ClipboardValue, ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(backend_error)?;
        let text = clipboard.get_text().map_err(backend_error)?;
        Ok(ClipboardValue::from_text(&text)?)
    }

    fn write(&self, value: &ClipboardValue) -> Result<(), ClipboardError> {
        let text = value.as_text().ok_or(ClipboardError::NotText)?;
        let mut clipboard = arboard::Clipboard::new().map_err(backend_error)?;
        clipboard.set_text(text).map_err(backend_error)
    }
}
