//! Inference client: build the chat request, POST it, hand back the JSON.
//!
//! ## Message Layout
//!
//! The request contains (in order):
//! 1. **System message** *(only when context text is non-empty)* — the raw
//!    context text, verbatim
//! 2. **User message** — the instruction text part followed by the screenshot
//!    as an `image_url` part carrying a `data:image/png;base64,…` URI
//!
//! ## No status check
//!
//! The reply body is parsed as JSON and returned whatever the HTTP status.
//! Error bodies from the API are JSON too, and [`extract_answer`] turns them
//! into a [`ResponseError`] the session loop can report. A body that is not
//! JSON at all (an HTML page from a proxy) is [`ResponseError::InvalidBody`].

use crate::config::SessionConfig;
use crate::error::{AppError, ResponseError};
use crate::prompts::png_data_uri;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Request body for the chat-completion endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// One role/content entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// Build the request for one screenshot.
///
/// Empty `context` means no system message at all.
pub fn build_request(
    model: &str,
    instruction: &str,
    base64_png: &str,
    context: &str,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);

    if !context.is_empty() {
        messages.push(ChatMessage {
            role: Role::System,
            content: MessageContent::Text(context.to_string()),
        });
    }

    messages.push(ChatMessage {
        role: Role::User,
        content: MessageContent::Parts(vec![
            ContentPart::Text {
                text: instruction.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: png_data_uri(base64_png),
                },
            },
        ]),
    });

    ChatRequest {
        model: model.to_string(),
        messages,
    }
}

/// A reply that arrived: its JSON body, or why the body could not be parsed.
pub type ReplyBody = Result<Value, ResponseError>;

/// HTTP client bound to one endpoint, model, and credential.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    instruction: String,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl InferenceClient {
    /// Build a client from the session configuration.
    pub fn new(config: &SessionConfig) -> Result<Self, AppError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| AppError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            instruction: config.instruction.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one screenshot with optional context and return the parsed body.
    pub async fn ask(&self, base64_png: &str, context: &str) -> Result<ReplyBody, AppError> {
        let request = build_request(&self.model, &self.instruction, base64_png, context);
        self.send(&request).await
    }

    /// POST `request` and parse the body as JSON, whatever the status.
    ///
    /// Only transport failures are an `Err`. A body that arrives but is not
    /// JSON is a [`ResponseError::InvalidBody`] inside the `Ok`.
    pub async fn send(&self, request: &ChatRequest) -> Result<ReplyBody, AppError> {
        let start = Instant::now();
        info!(
            "Sending {} messages to {} (model {})",
            request.messages.len(),
            self.endpoint,
            request.model
        );

        let transport_error = |e: reqwest::Error| AppError::RequestFailed {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Endpoint returned HTTP {}; forwarding body", status);
        }

        let text = response.text().await.map_err(transport_error)?;
        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                warn!("HTTP {} body is not JSON ({} bytes): {}", status, text.len(), e);
                return Ok(Err(ResponseError::InvalidBody {
                    status: status.as_u16(),
                    reason: e.to_string(),
                }));
            }
        };

        if let Some(usage) = body.get("usage") {
            let input = usage.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            let output = usage.get("completion_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
            debug!(
                "Usage: {} input tokens, {} output tokens, {:?}",
                input,
                output,
                start.elapsed()
            );
        }

        Ok(Ok(body))
    }
}

/// Pull `choices[0].message.content` out of a reply.
pub fn extract_answer(response: &Value) -> Result<String, ResponseError> {
    let Some(choices) = response.get("choices") else {
        if let Some(message) = response
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return Err(ResponseError::Api {
                message: message.to_string(),
            });
        }
        return Err(ResponseError::MissingChoices);
    };

    let first = choices
        .as_array()
        .ok_or(ResponseError::MissingChoices)?
        .first()
        .ok_or(ResponseError::EmptyChoices)?;

    first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ResponseError::MissingContent)
}
