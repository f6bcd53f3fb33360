//! Fixed texts sent to the model or shown to the user.
//!
//! Callers can override the instruction via
//! [`crate::config::SessionConfig::instruction`]; the failure strings are
//! fixed so scripts watching the clipboard can recognise them.

/// Default user instruction sent alongside every screenshot.
pub const DEFAULT_INSTRUCTION: &str = "Given the image, directly provide answers to the question posed. \
Base your responses on the provided context, ensuring accuracy and relevance. Provide answers only.";

/// Printed when a reply carries no answer.
pub const RESPONSE_FAILURE_MESSAGE: &str = "Failed to process the response.";

/// Placed on the clipboard instead of an answer when the reply carries none.
pub const CLIPBOARD_FAILURE_TEXT: &str = "Error in processing the response.";

/// Build the data URI for a base64 PNG payload.
pub fn png_data_uri(base64_png: &str) -> String {
    format!("data:image/png;base64,{base64_png}")
}

/// Onboarding line shown once before the first wait.
pub fn onboarding_banner(trigger_name: &str) -> String {
    format!(
        "Press '{}' to capture a screenshot and analyze it. Press Ctrl+C to exit.",
        trigger_name.to_uppercase()
    )
}
