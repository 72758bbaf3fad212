//! Chat transport: backend trait, message types, and dialect selection.
//!
//! A [`Backend`] turns an ordered list of role-tagged messages (plus an
//! optional output schema) into one answer string. The HTTP implementation
//! speaks two wire dialects, chosen from the configured base URL:
//!
//! ```text
//! Pipeline ──► ChatRequest ──► with_backoff() ──► Backend::chat() ──► answer
//!                                                       │
//!                                             ┌─────────┴─────────┐
//!                                      OpenAiCompatible         Gemini
//!                                     /chat/completions   /models/{m}:generateContent
//!                                         SSE deltas       SSE candidates
//! ```

pub mod backoff;
pub mod gemini;
pub mod http;
pub mod mock;
pub mod openai;
pub mod sse;

pub use backoff::BackoffConfig;
pub use http::HttpBackend;
pub use mock::MockBackend;

use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Receives each streamed increment, or the whole answer once when buffered.
pub type TokenSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One chat call, independent of the wire dialect.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Ordered conversation; the last message is usually the user inquiry or
    /// a partial assistant completion to be continued.
    pub messages: Vec<ChatMessage>,

    /// JSON schema the completion must satisfy, if any.
    pub schema: Option<Value>,

    /// Extra attempts allowed by [`with_backoff`]. `None` uses the
    /// [`BackoffConfig`] default. Backends themselves never read this.
    pub retry_budget: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            schema: None,
            retry_budget: None,
        }
    }

    pub fn with_schema(mut self, schema: Option<Value>) -> Self {
        self.schema = schema;
        self
    }
}

/// Request/response wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `POST {base}/chat/completions`, bearer auth, `choices` responses.
    OpenAiCompatible,
    /// `POST {base}/models/{model}:generateContent`, key in the query string.
    Gemini,
}

impl Dialect {
    /// Pick the dialect from the API base URL.
    pub fn detect(base_url: &str) -> Self {
        if base_url.contains("generativelanguage.google") {
            Dialect::Gemini
        } else {
            Dialect::OpenAiCompatible
        }
    }
}

/// Abstraction over chat completion providers.
///
/// When `sink` is present the backend may stream, calling it once per
/// increment; a buffered backend calls it exactly once with the full answer.
/// The returned string is always the complete answer.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn chat(&self, request: &ChatRequest, sink: Option<TokenSink<'_>>) -> Result<String>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Check whether a [`PipelineError`] is worth another attempt.
///
/// Only timeouts and connection failures are. Status errors and malformed
/// payloads are returned as-is.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Request(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Execute a chat call, re-issuing it after transient failures.
///
/// The number of extra attempts is the request's `retry_budget`, or
/// `config.max_retries` when the request leaves it unset. A call that has
/// already handed text to the sink is not re-issued.
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    request: &ChatRequest,
    config: &BackoffConfig,
    mut sink: Option<TokenSink<'_>>,
) -> Result<String> {
    let budget = request.retry_budget.unwrap_or(config.max_retries);
    let mut attempt = 0;

    loop {
        let mut delivered = false;
        let result = match sink.as_mut() {
            Some(s) => {
                let mut tracked = |text: &str| {
                    delivered = true;
                    s(text)
                };
                backend.chat(request, Some(&mut tracked)).await
            }
            None => backend.chat(request, None).await,
        };

        match result {
            Ok(answer) => return Ok(answer),
            Err(e) if !delivered && attempt < budget && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                tracing::warn!(
                    backend = backend.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying chat call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if delivered && is_retryable(&e) {
                    tracing::warn!(backend = backend.name(), error = %e, "answer cut off midway, not retrying");
                }
                return Err(e);
            }
        }
    }
}
