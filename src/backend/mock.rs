//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] returns pre-configured replies in order and records every
//! request it receives, so pipeline and evaluator tests can assert on the
//! exact messages that would have been sent.
//!
//! # Example
//!
//! ```
//! use llm_regress::backend::MockBackend;
//!
//! let mock = MockBackend::new(vec!["Hello, world!".to_string()]);
//! assert!(mock.requests().is_empty());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{Backend, ChatRequest, TokenSink};
use crate::error::Result;
use crate::PipelineError;

/// A test backend that returns canned replies in order.
///
/// Cycles back to the beginning when all replies have been consumed. A
/// scripted `Err(status)` is returned as [`PipelineError::HttpError`]. The
/// sink, when given, receives the whole reply as one increment.
#[derive(Debug)]
pub struct MockBackend {
    script: Vec<std::result::Result<String, u16>>,
    index: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned replies.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock that always returns the same reply.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock whose every call fails with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self::scripted(vec![Err(status)])
    }

    /// Mix replies and status failures, consumed in order.
    pub fn scripted(script: Vec<std::result::Result<String, u16>>) -> Self {
        assert!(!script.is_empty(), "MockBackend requires at least one reply");
        Self {
            script,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> std::result::Result<String, u16> {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.script.len();
        self.script[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn chat(&self, request: &ChatRequest, sink: Option<TokenSink<'_>>) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.next_reply() {
            Ok(text) => {
                if let Some(sink) = sink {
                    sink(&text);
                }
                Ok(text)
            }
            Err(status) => Err(PipelineError::HttpError {
                status,
                status_text: StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or_default()
                    .to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
