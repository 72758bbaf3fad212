//! Run configuration, built once at startup and passed down explicitly.
//!
//! Nothing in the library reads the environment; the binary maps its
//! command line (and the `LLM_*` variables) onto these values.

use std::time::Duration;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Transport configuration for [`HttpBackend`](crate::backend::HttpBackend).
#[derive(Clone)]
pub struct ChatConfig {
    /// API base URL. Its content also selects the wire dialect.
    pub base_url: String,

    /// Bearer token (OpenAI-style) or `key` query parameter (Gemini-style).
    pub api_key: Option<String>,

    /// Model identifier.
    pub model: String,

    /// Use the token-streaming endpoint when the caller supplies a sink.
    pub streaming: bool,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Sampling temperature. 0.0 is fully deterministic.
    pub temperature: f64,

    /// Connect timeout, and the longest wait for the next bytes of a response.
    pub timeout: Duration,

    /// Total attempts for one chat call, counting the first.
    pub max_retry_attempt: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            streaming: true,
            max_tokens: 200,
            temperature: 0.0,
            timeout: Duration::from_secs(17),
            max_retry_attempt: 3,
        }
    }
}

impl ChatConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retry_attempt(mut self, attempts: u32) -> Self {
        self.max_retry_attempt = attempts;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.chars().count() > 6 {
                        format!("{}***", k.chars().take(6).collect::<String>())
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .field("model", &self.model)
            .field("streaming", &self.streaming)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("max_retry_attempt", &self.max_retry_attempt)
            .finish()
    }
}

/// Which stages run and how their prompts are shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Ask for JSON matching a schema instead of `key: value` lines.
    pub json_schema: bool,

    /// Run the single `reply` stage instead of `reason` then `respond`.
    pub zero_shot: bool,
}

impl PipelineConfig {
    pub fn with_json_schema(mut self, enabled: bool) -> Self {
        self.json_schema = enabled;
        self
    }

    pub fn with_zero_shot(mut self, enabled: bool) -> Self {
        self.zero_shot = enabled;
        self
    }
}

/// Reporting switches for the scenario evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// Print the stage review after passing checks too.
    pub debug_pipeline: bool,

    /// Treat the first mismatch as fatal.
    pub fail_fast: bool,
}
