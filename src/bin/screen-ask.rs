//! CLI binary for screen-ask.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SessionConfig`, wires in the desktop collaborators, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use screen_ask::prompts::{onboarding_banner, RESPONSE_FAILURE_MESSAGE};
use screen_ask::{
    remove_screenshot, AppError, CycleStage, KeyListenerTrigger, ResponseError, Session,
    SessionConfig, SessionObserver, SystemClipboard, TriggerKey, XcapCapturer,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

fn clear_terminal() {
    print!("\x1b[2J\x1b[H");
    io::stdout().flush().ok();
}

// ── Terminal reporter ────────────────────────────────────────────────────────

/// Prints the banner, a spinner while a cycle runs, then the answer.
struct TerminalReporter {
    clear: bool,
    spinner: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    fn new(clear: bool, spinner: bool) -> Arc<Self> {
        Arc::new(Self {
            clear,
            spinner,
            bar: Mutex::new(None),
        })
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl SessionObserver for TerminalReporter {
    fn on_session_start(&self, trigger: TriggerKey) {
        if self.clear {
            clear_terminal();
        }
        println!("{}", bold(&onboarding_banner(&trigger.name())));
    }

    fn on_cycle_start(&self, _cycle: usize) {
        if self.clear {
            clear_terminal();
        }
        if !self.spinner {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_stage(&self, _cycle: usize, stage: CycleStage) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                bar.set_message(format!("{stage}…"));
            }
        }
    }

    fn on_answer(&self, _cycle: usize, answer: &str) {
        self.finish_bar();
        println!("{answer}");
    }

    fn on_response_error(&self, _cycle: usize, error: &ResponseError) {
        self.finish_bar();
        eprintln!("{}", red(RESPONSE_FAILURE_MESSAGE));
        eprintln!("{}", dim(&format!("Error: {error}")));
    }

    fn on_cycle_error(&self, _cycle: usize, error: &AppError) {
        self.finish_bar();
        eprintln!("{} {}", red("✘"), red(&error.to_string()));
    }
}

// ── CLI ──────────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Default: Caps Lock triggers, context from ./context_folder
  OPENAI_API_KEY=sk-... screen-ask

  # Use F9 and a different context folder, creating it if missing
  screen-ask --trigger f9 --context-dir ~/exam-notes --create-context-dir

  # Point at an OpenAI-compatible server
  screen-ask --endpoint http://localhost:11434/v1/chat/completions --model llava

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key sent as a bearer token
  SCREEN_ASK_ENDPOINT     Chat-completion URL
  SCREEN_ASK_MODEL        Model identifier
  SCREEN_ASK_TRIGGER      Trigger key (caps lock, scroll lock, pause, insert, f1..f12)
  PDFIUM_LIB_PATH         Path to libpdfium for reading .pdf context files
  RUST_LOG                Overrides the log filter

CONTEXT FILES:
  Every .txt and .pdf file in the context folder is read on each trigger and
  sent as a system message. .txt files that are not UTF-8 are read as
  ISO-8859-1. A PDF that cannot be read is logged and skipped.
"#;

/// Answer questions on screen with a vision LLM at the press of a key.
#[derive(Parser, Debug)]
#[command(
    name = "screen-ask",
    version,
    about = "Press a key, screenshot the display, and copy a vision LLM's answer to the clipboard",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// API key for the chat-completion endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Chat-completion endpoint URL.
    #[arg(long, env = "SCREEN_ASK_ENDPOINT", default_value = screen_ask::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Model identifier.
    #[arg(long, env = "SCREEN_ASK_MODEL", default_value = screen_ask::config::DEFAULT_MODEL)]
    model: String,

    /// Global trigger key.
    #[arg(long, env = "SCREEN_ASK_TRIGGER", default_value = "caps lock")]
    trigger: String,

    /// Folder of .txt / .pdf context files.
    #[arg(long, env = "SCREEN_ASK_CONTEXT_DIR", default_value = screen_ask::config::DEFAULT_CONTEXT_DIR)]
    context_dir: PathBuf,

    /// Create the context folder at startup if it is missing.
    #[arg(long, env = "SCREEN_ASK_CREATE_CONTEXT_DIR")]
    create_context_dir: bool,

    /// Transient screenshot file, deleted after every request.
    #[arg(long, env = "SCREEN_ASK_SCREENSHOT", default_value = screen_ask::config::DEFAULT_SCREENSHOT_PATH)]
    screenshot: PathBuf,

    /// Path to a text file with a custom instruction for the model.
    #[arg(long, env = "SCREEN_ASK_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// pdfium shared library used for PDF text extraction.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Give up on a request after this many seconds (default: wait forever).
    #[arg(long, env = "SCREEN_ASK_TIMEOUT")]
    timeout: Option<u64>,

    /// Do not clear the terminal on each trigger.
    #[arg(long, env = "SCREEN_ASK_NO_CLEAR")]
    no_clear: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCREEN_ASK_VERBOSE")]
    verbose: bool,

    /// Suppress everything except answers and errors.
    #[arg(short, long, env = "SCREEN_ASK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli).await?;
    let screenshot_path = config.screenshot_path.clone();

    // ── Desktop collaborators ────────────────────────────────────────────
    let clipboard = SystemClipboard::new().context("Failed to open the system clipboard")?;
    let mut trigger =
        KeyListenerTrigger::spawn(config.trigger_key).context("Failed to install key hook")?;

    // Spinner and clearing both fight with DEBUG logs on the same terminal.
    let reporter =
        TerminalReporter::new(!cli.no_clear && !cli.verbose, !cli.quiet && !cli.verbose);
    let mut session = Session::new(config, Arc::new(XcapCapturer), Box::new(clipboard))
        .context("Failed to start session")?
        .with_observer(reporter);

    // ── Run until killed ─────────────────────────────────────────────────
    tokio::select! {
        summary = session.run(&mut trigger) => {
            anyhow::bail!(
                "Key listener stopped after {} cycles ({} answered); \
                 check input-monitoring / accessibility permissions",
                summary.cycles,
                summary.answered
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
        }
    }

    remove_screenshot(&screenshot_path);
    if !cli.quiet {
        eprintln!("{}", dim("Bye."));
    }
    Ok(())
}

/// Map CLI args to `SessionConfig`.
async fn build_config(cli: &Cli) -> Result<SessionConfig> {
    let trigger: TriggerKey = cli.trigger.parse().context("Invalid --trigger")?;

    let mut builder = SessionConfig::builder()
        .api_key(cli.api_key.clone())
        .endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .trigger_key(trigger)
        .context_dir(cli.context_dir.clone())
        .screenshot_path(cli.screenshot.clone())
        .create_context_dir(cli.create_context_dir);

    if let Some(ref path) = cli.instruction {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(text.trim().to_string());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}
