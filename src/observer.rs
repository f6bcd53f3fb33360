//! Callback trait for session events.
//!
//! Inject an [`Arc<dyn SessionObserver>`] via
//! [`crate::session::Session::with_observer`] to receive events as the loop
//! waits, captures, and reports. The library prints nothing itself; the CLI's
//! terminal reporter is one implementation, tests use recording ones.
//!
//! # Example
//!
//! ```rust
//! use screen_ask::{SessionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     answers: Arc<AtomicUsize>,
//! }
//!
//! impl SessionObserver for CountingObserver {
//!     fn on_answer(&self, cycle: usize, answer: &str) {
//!         self.answers.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("cycle {cycle}: {answer}");
//!     }
//! }
//!
//! let observer: Arc<dyn SessionObserver> = Arc::new(CountingObserver {
//!     answers: Arc::new(AtomicUsize::new(0)),
//! });
//! observer.on_answer(1, "42");
//! ```

use crate::config::TriggerKey;
use crate::error::{AppError, ResponseError};
use crate::session::CycleStage;
use std::sync::Arc;

/// Called by the session loop. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// Called once before the first wait.
    fn on_session_start(&self, trigger: TriggerKey) {
        let _ = trigger;
    }

    /// Called when a trigger starts cycle number `cycle` (1-based).
    fn on_cycle_start(&self, cycle: usize) {
        let _ = cycle;
    }

    /// Called on entry to each stage. `cycle` is 0 for the idle wait before
    /// the first cycle.
    fn on_stage(&self, cycle: usize, stage: CycleStage) {
        let _ = (cycle, stage);
    }

    /// Called with the extracted answer, after it was copied.
    fn on_answer(&self, cycle: usize, answer: &str) {
        let _ = (cycle, answer);
    }

    /// Called when the reply carried no answer, after the placeholder was copied.
    fn on_response_error(&self, cycle: usize, error: &ResponseError) {
        let _ = (cycle, error);
    }

    /// Called when the cycle was aborted before a reply was available.
    fn on_cycle_error(&self, cycle: usize, error: &AppError) {
        let _ = (cycle, error);
    }
}

/// A no-op implementation, used when no observer is configured.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Convenience alias for the type stored in [`crate::session::Session`].
pub type ObserverRef = Arc<dyn SessionObserver>;
