//! # screen-ask
//!
//! Press a global hotkey, get an answer about what is on screen.
//!
//! Each press captures the display, sends it to a vision-capable chat model
//! together with text gathered from a local folder of `.txt` and `.pdf`
//! files, and puts the model's answer on the clipboard.
//!
//! ## Pipeline Overview
//!
//! ```text
//! trigger key
//!  │
//!  ├─ 1. Capture  grab the display into a transient PNG (xcap)
//!  ├─ 2. Encode   PNG → base64 data URI
//!  ├─ 3. Context  concatenate .txt / .pdf text from the context folder
//!  ├─ 4. Ask      POST to the chat-completion endpoint
//!  ├─ 5. Clean    delete the screenshot
//!  └─ 6. Report   answer (or fixed failure text) → clipboard + terminal
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "desktop")]
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use screen_ask::{KeyListenerTrigger, Session, SessionConfig, SystemClipboard, XcapCapturer};
//! use std::sync::Arc;
//!
//! let config = SessionConfig::builder()
//!     .api_key(std::env::var("OPENAI_API_KEY")?)
//!     .build()?;
//! let mut trigger = KeyListenerTrigger::spawn(config.trigger_key)?;
//! let mut session = Session::new(
//!     config,
//!     Arc::new(XcapCapturer),
//!     Box::new(SystemClipboard::new()?),
//! )?;
//! session.run(&mut trigger).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `screen-ask` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `desktop` | on      | Real screen grab, key hook, and clipboard (xcap + rdev + copypasta) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clipboard;
pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod trigger;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use clipboard::ClipboardSink;
pub use config::{SessionConfig, SessionConfigBuilder, TriggerKey};
pub use error::{AppError, ContextFileError, ResponseError};
pub use observer::{NoopObserver, ObserverRef, SessionObserver};
pub use pipeline::capture::ScreenCapturer;
pub use pipeline::context::{load_context, LoadedContext};
pub use pipeline::llm::{extract_answer, InferenceClient, ReplyBody};
pub use session::{remove_screenshot, CycleOutcome, CycleStage, Session, SessionSummary};
pub use trigger::{TriggerEvent, TriggerSource};

#[cfg(feature = "desktop")]
pub use clipboard::SystemClipboard;
#[cfg(feature = "desktop")]
pub use pipeline::capture::XcapCapturer;
#[cfg(feature = "desktop")]
pub use trigger::KeyListenerTrigger;
