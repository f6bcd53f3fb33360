//! Context loading: concatenate the text of every `.txt` and `.pdf` file in
//! the context folder.
//!
//! The folder is re-read on every capture cycle so edits take effect on the
//! next trigger. One bad file never spoils the batch: read and extraction
//! failures are logged, recorded in [`LoadedContext::errors`], and the loop
//! moves on to the next entry.
//!
//! Entries are visited in directory-listing order, which differs between
//! platforms. Nothing downstream depends on that order.

use crate::error::{AppError, ContextFileError};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Text assembled from the context folder for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedContext {
    /// Each file's text followed by `\n`, concatenated.
    pub text: String,
    /// Number of `.txt` / `.pdf` entries that contributed text (possibly empty).
    pub files: usize,
    /// Files that failed; already logged.
    pub errors: Vec<ContextFileError>,
}

impl LoadedContext {
    /// True when there is no context to send.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextKind {
    Text,
    Pdf,
}

fn classify(file_name: &str) -> Option<ContextKind> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".txt") {
        Some(ContextKind::Text)
    } else if lower.ends_with(".pdf") {
        Some(ContextKind::Pdf)
    } else {
        None
    }
}

/// Load context text from `dir` off the async executor.
///
/// pdfium is a blocking C library, so the whole scan runs under
/// `spawn_blocking`.
pub async fn load_context(
    dir: &Path,
    pdfium_library: Option<&Path>,
) -> Result<LoadedContext, AppError> {
    let dir = dir.to_path_buf();
    let library = pdfium_library.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || load_context_blocking(&dir, library.as_deref()))
        .await
        .map_err(|e| AppError::Internal(format!("Context task panicked: {}", e)))
}

/// Blocking implementation of the folder scan.
///
/// A missing folder yields an empty context; it is never created here.
pub fn load_context_blocking(dir: &Path, pdfium_library: Option<&Path>) -> LoadedContext {
    let mut loaded = LoadedContext::default();

    if !dir.exists() {
        debug!("Context folder {} does not exist; no context", dir.display());
        return loaded;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list context folder {}: {}", dir.display(), e);
            loaded.errors.push(ContextFileError::Read {
                path: dir.to_path_buf(),
                detail: e.to_string(),
            });
            return loaded;
        }
    };

    // Bound lazily: folders without PDFs never touch pdfium.
    let mut pdfium: Option<Result<Pdfium, String>> = None;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(kind) = classify(&name) else {
            continue;
        };
        if !path.is_file() {
            debug!("Skipping non-file entry {}", path.display());
            continue;
        }

        match kind {
            ContextKind::Text => match read_text_file(&path) {
                Ok(text) => {
                    loaded.text.push_str(&text);
                    loaded.text.push('\n');
                    loaded.files += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    loaded.errors.push(e);
                }
            },
            ContextKind::Pdf => {
                let engine = pdfium.get_or_insert_with(|| bind_pdfium(pdfium_library));
                let text = match engine {
                    Ok(engine) => extract_pdf_text(engine, &path),
                    Err(detail) => Err(ContextFileError::Pdf {
                        path: path.clone(),
                        detail: detail.clone(),
                    }),
                };
                match text {
                    Ok(text) => loaded.text.push_str(&text),
                    Err(e) => {
                        warn!("{}", e);
                        loaded.errors.push(e);
                    }
                }
                // A failed PDF still contributes its separator line.
                loaded.text.push('\n');
                loaded.files += 1;
            }
        }
    }

    info!(
        "Loaded context: {} files, {} chars, {} errors",
        loaded.files,
        loaded.text.len(),
        loaded.errors.len()
    );
    loaded
}

/// Create the context folder if it is missing. Returns true when created.
///
/// Called once at startup when `create_context_dir` is enabled; failure is
/// fatal there.
pub fn ensure_context_dir(dir: &Path) -> Result<bool, AppError> {
    if dir.exists() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir).map_err(|e| AppError::ContextDirCreate {
        path: dir.to_path_buf(),
        source: e,
    })?;
    info!("Created context folder {}", dir.display());
    Ok(true)
}

/// Read a text file as UTF-8, falling back to ISO-8859-1.
fn read_text_file(path: &Path) -> Result<String, ContextFileError> {
    let bytes = std::fs::read(path).map_err(|e| ContextFileError::Read {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(decode_text(bytes))
}

/// Decode bytes as UTF-8, or as ISO-8859-1 when they are not valid UTF-8.
///
/// ISO-8859-1 maps every byte to the code point of the same value, so the
/// fallback cannot fail.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!("Not UTF-8 ({}); decoding as ISO-8859-1", e.utf8_error());
            e.into_bytes().iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Bind to a pdfium library: explicit path, then the working directory,
/// then the system library.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, String> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path.to_string_lossy().to_string()),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| format!("pdfium library unavailable: {:?}", e))?;

    Ok(Pdfium::new(bindings))
}

/// Extract text page by page. Any failure discards the whole file's text.
fn extract_pdf_text(pdfium: &Pdfium, path: &Path) -> Result<String, ContextFileError> {
    let pdf_error = |detail: String| ContextFileError::Pdf {
        path: PathBuf::from(path),
        detail,
    };

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| pdf_error(format!("{:?}", e)))?;

    let mut text = String::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| pdf_error(format!("page {}: {:?}", idx + 1, e)))?;
        text.push_str(&page_text.all());
    }

    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}
