//! # LLM Regress
//!
//! A two-stage conversational pipeline over a chat-completion API, and a
//! runner that replays scripted conversations against it.
//!
//! ## Core Concepts
//!
//! - **[`Pipeline`]** runs one turn: `Reason` (what to look up, what was
//!   found, the topic) then `Respond` (the answer), or a single `Reply`
//!   stage in zero-shot mode.
//! - **[`Backend`](backend::Backend)** sends chat messages. [`HttpBackend`]
//!   speaks both the OpenAI-compatible and the Gemini dialect, buffered or
//!   streamed over server-sent events.
//! - **[`codec`]** turns field maps into prompt text and completions back
//!   into field maps, in `key: value` lines or JSON.
//! - **[`ScenarioEvaluator`]** checks answers against transcripts and
//!   prints a colored report.
//! - **[`Delegates`]** observes stage enter/leave and answer increments.
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_regress::{ChatConfig, EvalOptions, HttpBackend, Pipeline, PipelineConfig, ScenarioEvaluator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = HttpBackend::new(ChatConfig::default().with_api_key("sk-..."))?;
//!     let pipeline = Pipeline::new(Arc::new(backend), PipelineConfig::default());
//!
//!     let transcript = "\
//! User: What is Pitch Lake in Trinidad famous for?
//! Assistant: /asphalt/
//! ";
//!     let mut evaluator = ScenarioEvaluator::new(&pipeline, EvalOptions::default(), std::io::stdout());
//!     let summary = evaluator.evaluate_str(transcript).await?;
//!     assert!(summary.passed());
//!     Ok(())
//! }
//! ```

pub mod ansi;
pub mod backend;
pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod matcher;
pub mod pipeline;
pub mod prompt;
pub mod repl;
pub mod stage;
pub mod types;

pub use backend::{BackoffConfig, Dialect, HttpBackend, MockBackend};
pub use chain::{BoxFut, Chain, Step};
pub use config::{ChatConfig, EvalOptions, PipelineConfig};
pub use error::{EvalError, PipelineError, Result};
pub use evaluator::{ScenarioEvaluator, Summary};
pub use events::{Delegates, NoDelegates, StageRecorder};
pub use pipeline::Pipeline;
pub use repl::Repl;
pub use stage::Stage;
pub use types::{Context, HistoryEntry};
