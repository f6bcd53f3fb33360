//! The session loop: wait for a trigger, run one capture cycle, repeat.
//!
//! ## States
//!
//! ```text
//! Idle ──trigger──▶ Capturing ──▶ Encoding ──▶ LoadingContext ──▶ Requesting ──▶ Reporting
//!  ▲                                                                                 │
//!  └─────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cycles are strictly sequential. Nothing in a cycle can take the loop down:
//! failures before a reply exists abort the cycle ([`CycleOutcome::Aborted`]),
//! replies without an answer put the fixed placeholder on the clipboard
//! ([`CycleOutcome::ResponseFailed`]). Either way the loop goes back to Idle.
//!
//! The screenshot file is deleted as soon as the request returns, before the
//! reply is inspected, and also on every early exit from the cycle.

use crate::clipboard::ClipboardSink;
use crate::config::SessionConfig;
use crate::error::{AppError, ResponseError};
use crate::observer::{NoopObserver, ObserverRef};
use crate::pipeline::capture::{capture_screenshot, ScreenCapturer};
use crate::pipeline::context::{ensure_context_dir, load_context};
use crate::pipeline::encode::encode_image_file;
use crate::pipeline::llm::{extract_answer, InferenceClient, ReplyBody};
use crate::prompts::CLIPBOARD_FAILURE_TEXT;
use crate::trigger::TriggerSource;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where a cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Capturing,
    Encoding,
    LoadingContext,
    Requesting,
    Reporting,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStage::Idle => "waiting for trigger",
            CycleStage::Capturing => "capturing screen",
            CycleStage::Encoding => "encoding screenshot",
            CycleStage::LoadingContext => "loading context",
            CycleStage::Requesting => "asking the model",
            CycleStage::Reporting => "reporting",
        };
        f.write_str(s)
    }
}

/// Result of one capture cycle.
///
/// A reply that arrived but holds no answer, including a body that is not
/// JSON, is `ResponseFailed`; only a missing reply is `Aborted`.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The reply carried an answer; it is on the clipboard.
    Answered(String),
    /// The reply carried no answer; the placeholder is on the clipboard.
    ResponseFailed(ResponseError),
    /// No reply: capture, encoding, context loading, or transport failed.
    /// The clipboard is left untouched.
    Aborted(AppError),
}

impl CycleOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            CycleOutcome::Answered(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, CycleOutcome::Answered(_))
    }
}

/// Counts for a finished [`Session::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub cycles: usize,
    pub answered: usize,
    pub failed: usize,
    pub aborted: usize,
}

impl SessionSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Answered(_) => self.answered += 1,
            CycleOutcome::ResponseFailed(_) => self.failed += 1,
            CycleOutcome::Aborted(_) => self.aborted += 1,
        }
    }
}

/// Remove the screenshot file if present. Returns true when a file was removed.
pub fn remove_screenshot(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed screenshot {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove screenshot {}: {}", path.display(), e);
            false
        }
    }
}

/// Deletes the screenshot when the cycle leaves scope, however it leaves.
struct ScreenshotGuard {
    path: PathBuf,
    armed: bool,
}

impl ScreenshotGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn remove(mut self) {
        self.armed = false;
        remove_screenshot(&self.path);
    }
}

impl Drop for ScreenshotGuard {
    fn drop(&mut self) {
        if self.armed {
            remove_screenshot(&self.path);
        }
    }
}

/// A capture session bound to one configuration and set of collaborators.
pub struct Session {
    config: SessionConfig,
    client: InferenceClient,
    capturer: Arc<dyn ScreenCapturer>,
    clipboard: Box<dyn ClipboardSink>,
    observer: ObserverRef,
    cycles: usize,
}

impl Session {
    /// Create a session. Creates the context folder first when configured to;
    /// failing to do so is a startup error.
    pub fn new(
        config: SessionConfig,
        capturer: Arc<dyn ScreenCapturer>,
        clipboard: Box<dyn ClipboardSink>,
    ) -> Result<Self, AppError> {
        if config.create_context_dir {
            ensure_context_dir(&config.context_dir)?;
        }
        let client = InferenceClient::new(&config)?;

        Ok(Self {
            config,
            client,
            capturer,
            clipboard,
            observer: Arc::new(NoopObserver),
            cycles: 0,
        })
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run cycles until `trigger` closes.
    ///
    /// With a real key hook that only happens if the hook dies; normally the
    /// process is terminated while this is waiting.
    pub async fn run<T>(&mut self, trigger: &mut T) -> SessionSummary
    where
        T: TriggerSource + ?Sized,
    {
        let mut summary = SessionSummary::default();
        self.observer.on_session_start(self.config.trigger_key);
        info!(
            "Session started: trigger '{}', context folder {}",
            self.config.trigger_key,
            self.config.context_dir.display()
        );

        loop {
            self.observer.on_stage(self.cycles, CycleStage::Idle);
            let Some(event) = trigger.next_trigger().await else {
                info!("Trigger source closed after {} cycles", summary.cycles);
                break;
            };
            debug!("Trigger '{}' received", event.key);

            let outcome = self.run_cycle().await;
            summary.record(&outcome);
        }

        summary
    }

    /// Run one capture cycle now, without waiting for a trigger.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        let cycle = self.cycles;
        self.observer.on_cycle_start(cycle);

        let response = match self.capture_and_ask(cycle).await {
            Ok(response) => response,
            Err(e) => {
                error!("Cycle {} aborted: {}", cycle, e);
                self.observer.on_cycle_error(cycle, &e);
                return CycleOutcome::Aborted(e);
            }
        };

        self.observer.on_stage(cycle, CycleStage::Reporting);
        match response.and_then(|body| extract_answer(&body)) {
            Ok(answer) => {
                info!("Cycle {}: answer of {} chars", cycle, answer.len());
                self.copy(&answer);
                self.observer.on_answer(cycle, &answer);
                CycleOutcome::Answered(answer)
            }
            Err(e) => {
                warn!("Cycle {}: failed to process the response: {}", cycle, e);
                self.copy(CLIPBOARD_FAILURE_TEXT);
                self.observer.on_response_error(cycle, &e);
                CycleOutcome::ResponseFailed(e)
            }
        }
    }

    /// Capturing → Encoding → LoadingContext → Requesting.
    async fn capture_and_ask(&self, cycle: usize) -> Result<ReplyBody, AppError> {
        let path = self.config.screenshot_path.clone();

        self.observer.on_stage(cycle, CycleStage::Capturing);
        let screenshot = ScreenshotGuard::new(path.clone());
        capture_screenshot(Arc::clone(&self.capturer), &path).await?;

        self.observer.on_stage(cycle, CycleStage::Encoding);
        let base64_png = encode_image_file(&path).await?;

        self.observer.on_stage(cycle, CycleStage::LoadingContext);
        let context = load_context(
            &self.config.context_dir,
            self.config.pdfium_library_path.as_deref(),
        )
        .await?;

        self.observer.on_stage(cycle, CycleStage::Requesting);
        let response = self.client.ask(&base64_png, &context.text).await;
        screenshot.remove();
        response
    }

    fn copy(&mut self, text: &str) {
        if let Err(e) = self.clipboard.set_text(text) {
            warn!("Could not copy to clipboard: {}", e);
        }
    }
}
