//! Pipeline stages for one capture cycle.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the OS-facing ones can be swapped for fakes.
//!
//! ## Data Flow
//!
//! ```text
//! capture ──▶ encode ──▶ context ──▶ llm
//! (screen)    (base64)   (txt/pdf)   (chat completion)
//! ```
//!
//! 1. [`capture`] — write the current display to the screenshot file
//! 2. [`encode`]  — read the file back and base64 it for the request body
//! 3. [`context`] — gather text from the context folder; pdfium work runs in
//!    `spawn_blocking`
//! 4. [`llm`]     — POST the chat request; the only stage with network I/O

pub mod capture;
pub mod context;
pub mod encode;
pub mod llm;
