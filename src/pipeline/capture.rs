//! Screen capture: grab the current display into the transient screenshot file.
//!
//! The OS side is behind [`ScreenCapturer`] so the session loop can run in
//! tests with a fake that writes a fixed image.

use crate::error::AppError;
use std::path::Path;
use std::sync::Arc;

/// Writes a PNG of the current screen to `path`, replacing any existing file.
pub trait ScreenCapturer: Send + Sync {
    fn capture_to(&self, path: &Path) -> Result<(), AppError>;
}

/// Run a capturer off the async executor.
///
/// Grabbing and PNG-encoding a 4K display takes long enough to stall a
/// Tokio worker, so it goes through `spawn_blocking` like pdfium work does.
pub async fn capture_screenshot(
    capturer: Arc<dyn ScreenCapturer>,
    path: &Path,
) -> Result<(), AppError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || capturer.capture_to(&path))
        .await
        .map_err(|e| AppError::Internal(format!("Capture task panicked: {}", e)))?
}

/// Captures the first monitor reported by the OS via `xcap`.
#[cfg(feature = "desktop")]
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapturer;

#[cfg(feature = "desktop")]
impl ScreenCapturer for XcapCapturer {
    fn capture_to(&self, path: &Path) -> Result<(), AppError> {
        use tracing::debug;
        use xcap::Monitor;

        let monitors = Monitor::all()
            .map_err(|e| AppError::Capture(format!("Failed to get monitors: {}", e)))?;
        let monitor = monitors
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Capture("No monitors found".into()))?;

        let image = monitor
            .capture_image()
            .map_err(|e| AppError::Capture(format!("Failed to capture image: {}", e)))?;

        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| {
                AppError::Capture(format!("Failed to write {}: {}", path.display(), e))
            })?;

        debug!(
            "Captured {}x{} px → {}",
            image.width(),
            image.height(),
            path.display()
        );
        Ok(())
    }
}
