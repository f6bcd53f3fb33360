//! Clipboard output for answers and the failure placeholder.

use crate::error::AppError;

/// Somewhere to put the text of each cycle's result.
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), AppError>;
}

/// The system clipboard via `copypasta`.
///
/// Keep one instance for the process lifetime: on X11 the clipboard contents
/// are served by the owning context and vanish when it is dropped.
#[cfg(feature = "desktop")]
pub struct SystemClipboard {
    ctx: copypasta::ClipboardContext,
}

#[cfg(feature = "desktop")]
impl SystemClipboard {
    pub fn new() -> Result<Self, AppError> {
        let ctx = copypasta::ClipboardContext::new()
            .map_err(|e| AppError::Clipboard(format!("cannot open clipboard: {e}")))?;
        Ok(Self { ctx })
    }
}

#[cfg(feature = "desktop")]
impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), AppError> {
        use copypasta::ClipboardProvider;

        self.ctx
            .set_contents(text.to_owned())
            .map_err(|e| AppError::Clipboard(e.to_string()))
    }
}
