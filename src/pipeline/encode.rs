//! Image encoding: screenshot file → base64 text for the request body.
//!
//! The bytes are forwarded untouched. The capture step already wrote a PNG,
//! so re-encoding here would only cost time.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Read an image file and return its raw bytes as standard, padded base64.
///
/// A missing or unreadable file is an [`AppError::ScreenshotRead`], which
/// aborts the current capture cycle only.
pub async fn encode_image_file(path: &Path) -> Result<String, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::ScreenshotRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let b64 = encode_bytes(&bytes);
    debug!("Encoded {} → {} bytes base64", path.display(), b64.len());
    Ok(b64)
}

/// Base64-encode an in-memory buffer.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
