//! Error types for the screen-ask library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`AppError`] — **Fatal for the current scope**: at startup it stops the
//!   program (bad configuration, context folder cannot be created, key hook
//!   unavailable); inside a capture cycle it aborts that cycle only. The
//!   session loop catches it, reports it, and goes back to waiting.
//!
//! * [`ContextFileError`] — **Non-fatal**: one context file could not be read
//!   or its PDF text could not be extracted. Stored in
//!   [`crate::pipeline::context::LoadedContext`] so the rest of the folder is
//!   still sent.
//!
//! * [`ResponseError`] — the chat-completion reply did not carry an answer.
//!   Turned into the fixed failure message and clipboard placeholder.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort startup or a single capture cycle.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The trigger key name is not one we can listen for.
    #[error("Unknown trigger key '{name}'\nTry: caps lock, scroll lock, pause, insert, f1..f12")]
    UnknownTriggerKey { name: String },

    /// The context folder was missing and could not be created.
    #[error("Failed to create context folder '{path}': {source}")]
    ContextDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input-capture errors ──────────────────────────────────────────────
    /// The global key hook could not be installed.
    #[error("Failed to start key listener: {0}")]
    KeyListener(String),

    /// Screen grab failed (no monitor, permission denied, encoder failure).
    #[error("Screen capture failed: {0}")]
    Capture(String),

    /// The screenshot file could not be read back for encoding.
    #[error("Failed to read screenshot '{path}': {source}")]
    ScreenshotRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The system clipboard could not be opened or written.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    // ── Network errors ────────────────────────────────────────────────────
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("Request to '{endpoint}' failed: {reason}\nCheck your internet connection.")]
    RequestFailed { endpoint: String, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single context file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextFileError {
    /// The file could not be read from disk.
    #[error("Error reading context file {path:?}: {detail}")]
    Read { path: PathBuf, detail: String },

    /// PDF text extraction failed (malformed file, pdfium unavailable).
    #[error("Error reading PDF file {path:?}: {detail}")]
    Pdf { path: PathBuf, detail: String },
}

impl ContextFileError {
    /// The file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ContextFileError::Read { path, .. } | ContextFileError::Pdf { path, .. } => path,
        }
    }
}

/// Why a chat-completion reply could not be turned into an answer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResponseError {
    /// The API returned its error shape instead of choices.
    #[error("API error: {message}")]
    Api { message: String },

    /// The body is not JSON (e.g. an HTML page from a proxy).
    #[error("response (HTTP {status}) is not valid JSON: {reason}")]
    InvalidBody { status: u16, reason: String },

    /// No `choices` array in the reply.
    #[error("response has no 'choices' field")]
    MissingChoices,

    /// `choices` is present but empty.
    #[error("response 'choices' is empty")]
    EmptyChoices,

    /// `choices[0].message.content` is absent or not a string.
    #[error("response has no 'choices[0].message.content' string")]
    MissingContent,
}
