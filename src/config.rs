//! Configuration types for the capture session.
//!
//! Every fixed value the pipeline needs (endpoint, model, trigger key, folder
//! and file names) lives in [`SessionConfig`] instead of in constants, so tests
//! can point the session at a mock endpoint and a scratch directory.
//!
//! # Example
//! ```rust
//! use screen_ask::{SessionConfig, TriggerKey};
//!
//! let config = SessionConfig::builder()
//!     .api_key("sk-test")
//!     .model("gpt-4o")
//!     .trigger_key(TriggerKey::ScrollLock)
//!     .context_dir("notes")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.context_dir.to_str(), Some("notes"));
//! ```

use crate::error::AppError;
use crate::prompts::DEFAULT_INSTRUCTION;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Hosted chat-completion endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Model identifier used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Folder scanned for context files when none is configured.
pub const DEFAULT_CONTEXT_DIR: &str = "context_folder";

/// Transient screenshot file used when none is configured.
pub const DEFAULT_SCREENSHOT_PATH: &str = "screenshot.png";

/// Configuration for a capture session.
///
/// Built via [`SessionConfig::builder()`]; `build()` fails without an API key.
#[derive(Clone)]
pub struct SessionConfig {
    /// Bearer token for the chat-completion endpoint. Held in memory only.
    pub api_key: String,

    /// Chat-completion URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model identifier sent in every request. Default: `gpt-4o`.
    pub model: String,

    /// Global key that starts a capture cycle. Default: Caps Lock.
    pub trigger_key: TriggerKey,

    /// Folder of `.txt` / `.pdf` files read on every cycle. Default: `context_folder`.
    pub context_dir: PathBuf,

    /// Where the screenshot is written for the duration of one cycle.
    /// Default: `screenshot.png` in the working directory.
    pub screenshot_path: PathBuf,

    /// User instruction sent with the image.
    pub instruction: String,

    /// Create `context_dir` at startup when it is missing. Default: false.
    ///
    /// The loader itself never creates the folder; a missing folder simply
    /// yields empty context.
    pub create_context_dir: bool,

    /// Explicit pdfium shared library for PDF text extraction.
    /// If None, the working directory and then the system library are tried.
    pub pdfium_library_path: Option<PathBuf>,

    /// Per-request timeout in seconds. Default: None (wait indefinitely).
    pub request_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            trigger_key: TriggerKey::default(),
            context_dir: PathBuf::from(DEFAULT_CONTEXT_DIR),
            screenshot_path: PathBuf::from(DEFAULT_SCREENSHOT_PATH),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            create_context_dir: false,
            pdfium_library_path: None,
            request_timeout_secs: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("trigger_key", &self.trigger_key)
            .field("context_dir", &self.context_dir)
            .field("screenshot_path", &self.screenshot_path)
            .field("create_context_dir", &self.create_context_dir)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn trigger_key(mut self, key: TriggerKey) -> Self {
        self.config.trigger_key = key;
        self
    }

    pub fn context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.context_dir = dir.into();
        self
    }

    pub fn screenshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.screenshot_path = path.into();
        self
    }

    pub fn instruction(mut self, text: impl Into<String>) -> Self {
        self.config.instruction = text.into();
        self
    }

    pub fn create_context_dir(mut self, v: bool) -> Self {
        self.config.create_context_dir = v;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, AppError> {
        let c = &self.config;
        if c.api_key.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "API key is required (set OPENAI_API_KEY or pass --api-key)".into(),
            ));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(AppError::InvalidConfig(format!(
                "Endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        if c.model.trim().is_empty() {
            return Err(AppError::InvalidConfig("Model must not be empty".into()));
        }
        if c.screenshot_path.as_os_str().is_empty() {
            return Err(AppError::InvalidConfig(
                "Screenshot path must not be empty".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(AppError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Trigger key ──────────────────────────────────────────────────────────

/// The global key that starts a capture cycle.
///
/// Limited to keys that are harmless to press system-wide: toggles and
/// function keys rather than printable characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerKey {
    #[default]
    CapsLock,
    ScrollLock,
    Pause,
    Insert,
    /// Function key `F1`..`F12`.
    Function(u8),
}

impl TriggerKey {
    /// Human-readable name, e.g. `caps lock`, `f9`.
    pub fn name(&self) -> String {
        match self {
            TriggerKey::CapsLock => "caps lock".to_string(),
            TriggerKey::ScrollLock => "scroll lock".to_string(),
            TriggerKey::Pause => "pause".to_string(),
            TriggerKey::Insert => "insert".to_string(),
            TriggerKey::Function(n) => format!("f{n}"),
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for TriggerKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();

        let key = match normalised.as_str() {
            "capslock" | "caps" => TriggerKey::CapsLock,
            "scrolllock" | "scroll" => TriggerKey::ScrollLock,
            "pause" | "break" => TriggerKey::Pause,
            "insert" | "ins" => TriggerKey::Insert,
            other => match other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                Some(n @ 1..=12) => TriggerKey::Function(n),
                _ => {
                    return Err(AppError::UnknownTriggerKey {
                        name: s.trim().to_string(),
                    })
                }
            },
        };
        Ok(key)
    }
}
