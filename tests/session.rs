//! Integration tests for the session loop.
//!
//! The OS collaborators are replaced with fakes: a scripted trigger source,
//! a capturer that writes fixed bytes, and a clipboard that records what it
//! was given. The chat-completion endpoint is a local `mockito` server.
//!
//! Run with:
//!   cargo test --test session --no-default-features

use async_trait::async_trait;
use screen_ask::prompts::CLIPBOARD_FAILURE_TEXT;
use screen_ask::{
    AppError, ClipboardSink, CycleOutcome, CycleStage, ResponseError, ScreenCapturer, Session,
    SessionConfig, SessionObserver, SessionSummary, TriggerEvent, TriggerKey, TriggerSource,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Fires `n` triggers, then closes.
struct ScriptedTrigger {
    remaining: usize,
}

impl ScriptedTrigger {
    fn presses(n: usize) -> Self {
        Self { remaining: n }
    }
}

#[async_trait]
impl TriggerSource for ScriptedTrigger {
    async fn next_trigger(&mut self) -> Option<TriggerEvent> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(TriggerEvent::now(TriggerKey::CapsLock))
    }
}

/// Writes `bytes` as the screenshot. On the call numbers in `fail_on` it
/// leaves a truncated file behind and then fails.
struct FakeCapturer {
    bytes: Vec<u8>,
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    /// Whether a leftover screenshot existed when each capture started.
    leftovers: Mutex<Vec<bool>>,
}

impl FakeCapturer {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            calls: AtomicUsize::new(0),
            fail_on: Vec::new(),
            leftovers: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, calls: &[usize]) -> Self {
        self.fail_on = calls.to_vec();
        self
    }
}

impl ScreenCapturer for FakeCapturer {
    fn capture_to(&self, path: &Path) -> Result<(), AppError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.leftovers.lock().unwrap().push(path.exists());
        if self.fail_on.contains(&call) {
            let half = &self.bytes[..self.bytes.len() / 2];
            std::fs::write(path, half).map_err(|e| AppError::Capture(e.to_string()))?;
            return Err(AppError::Capture("display went away".into()));
        }
        std::fs::write(path, &self.bytes).map_err(|e| AppError::Capture(e.to_string()))
    }
}

/// Records every text it is asked to copy.
#[derive(Clone, Default)]
struct RecordingClipboard {
    copied: Arc<Mutex<Vec<String>>>,
}

impl ClipboardSink for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), AppError> {
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<CycleStage>>,
    answers: Mutex<Vec<String>>,
    response_errors: Mutex<Vec<ResponseError>>,
    cycle_errors: Mutex<Vec<String>>,
}

impl SessionObserver for StageRecorder {
    fn on_stage(&self, _cycle: usize, stage: CycleStage) {
        self.stages.lock().unwrap().push(stage);
    }
    fn on_answer(&self, _cycle: usize, answer: &str) {
        self.answers.lock().unwrap().push(answer.to_string());
    }
    fn on_response_error(&self, _cycle: usize, error: &ResponseError) {
        self.response_errors.lock().unwrap().push(error.clone());
    }
    fn on_cycle_error(&self, _cycle: usize, error: &AppError) {
        self.cycle_errors.lock().unwrap().push(error.to_string());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Fixture {
    _dir: TempDir,
    context_dir: PathBuf,
    screenshot: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let context_dir = dir.path().join("context_folder");
        std::fs::create_dir(&context_dir).unwrap();
        let screenshot = dir.path().join("screenshot.png");
        Self {
            _dir: dir,
            context_dir,
            screenshot,
        }
    }

    fn config(&self, endpoint: &str) -> SessionConfig {
        SessionConfig::builder()
            .api_key("sk-test")
            .endpoint(endpoint)
            .context_dir(&self.context_dir)
            .screenshot_path(&self.screenshot)
            .build()
            .unwrap()
    }
}

fn answer_body(answer: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": answer}}],
        "usage": {"prompt_tokens": 812, "completion_tokens": 1}
    })
    .to_string()
}

fn completions_url(server: &mockito::ServerGuard) -> String {
    format!("{}/v1/chat/completions", server.url())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn answer_is_copied_and_screenshot_removed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(mockito::Matcher::Regex(
            // "PNGDATA" in base64
            "data:image/png;base64,UE5HREFUQQ==".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(answer_body("42"))
        .create_async()
        .await;

    let fx = Fixture::new();
    let clipboard = RecordingClipboard::default();
    let copied = Arc::clone(&clipboard.copied);
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"PNGDATA")),
        Box::new(clipboard),
    )
    .unwrap();

    let outcome = session.run_cycle().await;

    mock.assert_async().await;
    assert_eq!(outcome.answer(), Some("42"));
    assert_eq!(*copied.lock().unwrap(), vec!["42".to_string()]);
    assert!(!fx.screenshot.exists());
}

#[tokio::test]
async fn reply_without_choices_copies_placeholder_and_loop_continues() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(r#"{"id":"chatcmpl-2","object":"chat.completion"}"#)
        .expect(2)
        .create_async()
        .await;

    let fx = Fixture::new();
    let clipboard = RecordingClipboard::default();
    let copied = Arc::clone(&clipboard.copied);
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(clipboard),
    )
    .unwrap();

    let summary = session.run(&mut ScriptedTrigger::presses(2)).await;

    mock.assert_async().await;
    assert_eq!(
        summary,
        SessionSummary {
            cycles: 2,
            answered: 0,
            failed: 2,
            aborted: 0
        }
    );
    assert_eq!(
        *copied.lock().unwrap(),
        vec![CLIPBOARD_FAILURE_TEXT.to_string(); 2]
    );
}

#[tokio::test]
async fn api_error_reply_is_a_response_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body(
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        )
        .create_async()
        .await;

    let fx = Fixture::new();
    let recorder = Arc::new(StageRecorder::default());
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap()
    .with_observer(recorder.clone());

    match session.run_cycle().await {
        CycleOutcome::ResponseFailed(ResponseError::Api { message }) => {
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
    assert_eq!(recorder.response_errors.lock().unwrap().len(), 1);
    assert!(!fx.screenshot.exists());
}

#[tokio::test]
async fn context_files_are_sent_as_system_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::PartialJson(json!({"model": "gpt-4o"})),
            mockito::Matcher::Regex(
                r#""role":"system","content":"The capital of Australia is Canberra."#.to_string(),
            ),
        ]))
        .with_status(200)
        .with_body(answer_body("Canberra"))
        .create_async()
        .await;

    let fx = Fixture::new();
    std::fs::write(
        fx.context_dir.join("notes.txt"),
        "The capital of Australia is Canberra.",
    )
    .unwrap();
    std::fs::write(fx.context_dir.join("ignored.md"), "# not context").unwrap();

    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap();

    let outcome = session.run_cycle().await;

    mock.assert_async().await;
    assert_eq!(outcome.answer(), Some("Canberra"));
}

#[tokio::test]
async fn context_is_reread_every_cycle() {
    let mut server = mockito::Server::new_async().await;
    let without_context = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::Regex(
            r#"^\{"model":"gpt-4o","messages":\[\{"role":"user""#.to_string(),
        ))
        .with_status(200)
        .with_body(answer_body("first"))
        .expect(1)
        .create_async()
        .await;

    let fx = Fixture::new();
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap();

    assert_eq!(session.run_cycle().await.answer(), Some("first"));
    without_context.assert_async().await;

    std::fs::write(fx.context_dir.join("late.txt"), "added later").unwrap();
    let with_context = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::Regex(
            r#""role":"system","content":"added later"#.to_string(),
        ))
        .with_status(200)
        .with_body(answer_body("second"))
        .expect(1)
        .create_async()
        .await;

    assert_eq!(session.run_cycle().await.answer(), Some("second"));
    with_context.assert_async().await;
}

#[tokio::test]
async fn capture_failure_aborts_only_that_cycle() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(answer_body("B"))
        .expect(1)
        .create_async()
        .await;

    let fx = Fixture::new();
    let clipboard = RecordingClipboard::default();
    let copied = Arc::clone(&clipboard.copied);
    let recorder = Arc::new(StageRecorder::default());
    let capturer = Arc::new(FakeCapturer::new(b"png").failing_on(&[1]));
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        capturer.clone(),
        Box::new(clipboard),
    )
    .unwrap()
    .with_observer(recorder.clone());

    let summary = session.run(&mut ScriptedTrigger::presses(2)).await;

    mock.assert_async().await;
    assert_eq!(summary.aborted, 1);
    assert_eq!(summary.answered, 1);
    // Nothing is copied for an aborted cycle.
    assert_eq!(*copied.lock().unwrap(), vec!["B".to_string()]);
    let errors = recorder.cycle_errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("display went away"), "{}", errors[0]);
    // The truncated file from the failed capture did not survive the cycle.
    assert_eq!(*capturer.leftovers.lock().unwrap(), vec![false, false]);
    assert!(!fx.screenshot.exists());
}

#[tokio::test]
async fn truncated_capture_is_removed_when_cycle_aborts() {
    let fx = Fixture::new();
    let capturer = Arc::new(FakeCapturer::new(b"PNGDATA").failing_on(&[1]));
    let mut session = Session::new(
        fx.config("http://127.0.0.1:1/v1/chat/completions"),
        capturer.clone(),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap();

    let outcome = session.run_cycle().await;

    assert!(
        matches!(outcome, CycleOutcome::Aborted(AppError::Capture(_))),
        "got: {outcome:?}"
    );
    assert_eq!(capturer.calls.load(Ordering::SeqCst), 1);
    assert!(!fx.screenshot.exists());
}

#[tokio::test]
async fn non_json_reply_replaces_previous_answer_with_placeholder() {
    let mut server = mockito::Server::new_async().await;
    let answered = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(answer_body("B"))
        .expect(1)
        .create_async()
        .await;

    let fx = Fixture::new();
    let clipboard = RecordingClipboard::default();
    let copied = Arc::clone(&clipboard.copied);
    let recorder = Arc::new(StageRecorder::default());
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(clipboard),
    )
    .unwrap()
    .with_observer(recorder.clone());

    assert_eq!(session.run_cycle().await.answer(), Some("B"));
    answered.assert_async().await;
    answered.remove_async().await;

    server
        .mock("POST", "/v1/chat/completions")
        .with_status(502)
        .with_header("content-type", "text/html")
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    match session.run_cycle().await {
        CycleOutcome::ResponseFailed(ResponseError::InvalidBody { status, .. }) => {
            assert_eq!(status, 502);
        }
        other => panic!("expected an invalid body, got {other:?}"),
    }
    assert_eq!(
        *copied.lock().unwrap(),
        vec!["B".to_string(), CLIPBOARD_FAILURE_TEXT.to_string()]
    );
    assert_eq!(recorder.response_errors.lock().unwrap().len(), 1);
    assert!(recorder.cycle_errors.lock().unwrap().is_empty());
    assert!(!fx.screenshot.exists());
}

#[tokio::test]
async fn unreachable_endpoint_aborts_cycle_and_cleans_up() {
    let fx = Fixture::new();
    let clipboard = RecordingClipboard::default();
    let copied = Arc::clone(&clipboard.copied);
    let capturer = Arc::new(FakeCapturer::new(b"png"));
    let mut session = Session::new(
        fx.config("http://127.0.0.1:1/v1/chat/completions"),
        capturer.clone(),
        Box::new(clipboard),
    )
    .unwrap();

    let summary = session.run(&mut ScriptedTrigger::presses(2)).await;

    assert_eq!(summary.aborted, 2);
    assert!(copied.lock().unwrap().is_empty());
    assert!(!fx.screenshot.exists());
    // The first cycle's screenshot was gone before the second capture.
    assert_eq!(*capturer.leftovers.lock().unwrap(), vec![false, false]);
}

#[tokio::test]
async fn unreachable_endpoint_reports_request_failure() {
    let fx = Fixture::new();
    let mut session = Session::new(
        fx.config("http://127.0.0.1:1/v1/chat/completions"),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap();

    match session.run_cycle().await {
        CycleOutcome::Aborted(AppError::RequestFailed { endpoint, .. }) => {
            assert_eq!(endpoint, "http://127.0.0.1:1/v1/chat/completions");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn stages_are_reported_in_order() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(answer_body("42"))
        .create_async()
        .await;

    let fx = Fixture::new();
    let recorder = Arc::new(StageRecorder::default());
    let mut session = Session::new(
        fx.config(&completions_url(&server)),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap()
    .with_observer(recorder.clone());

    let summary = session.run(&mut ScriptedTrigger::presses(1)).await;

    assert_eq!(summary.answered, 1);
    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![
            CycleStage::Idle,
            CycleStage::Capturing,
            CycleStage::Encoding,
            CycleStage::LoadingContext,
            CycleStage::Requesting,
            CycleStage::Reporting,
            CycleStage::Idle,
        ]
    );
    assert_eq!(*recorder.answers.lock().unwrap(), vec!["42".to_string()]);
}

#[tokio::test]
async fn closed_trigger_source_ends_run_without_cycles() {
    let fx = Fixture::new();
    let mut session = Session::new(
        fx.config("http://127.0.0.1:1/v1/chat/completions"),
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap();

    let summary = session.run(&mut ScriptedTrigger::presses(0)).await;
    assert_eq!(summary, SessionSummary::default());
}

#[test]
fn missing_context_dir_is_created_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let context_dir = dir.path().join("nested").join("context_folder");
    let config = SessionConfig::builder()
        .api_key("sk-test")
        .context_dir(&context_dir)
        .screenshot_path(dir.path().join("screenshot.png"))
        .create_context_dir(true)
        .build()
        .unwrap();

    let session = Session::new(
        config,
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    );

    assert!(session.is_ok());
    assert!(context_dir.is_dir());
}

#[test]
fn missing_context_dir_is_left_alone_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let context_dir = dir.path().join("context_folder");
    let config = SessionConfig::builder()
        .api_key("sk-test")
        .context_dir(&context_dir)
        .build()
        .unwrap();

    Session::new(
        config,
        Arc::new(FakeCapturer::new(b"png")),
        Box::new(RecordingClipboard::default()),
    )
    .unwrap();

    assert!(!context_dir.exists());
}
