use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the transport and the pipeline stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON encoding or decoding failed, including a malformed streamed chunk.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    ///
    /// The body is never read in this case.
    #[error("HTTP error: {status} {status_text}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Canonical reason phrase for the status.
        status_text: String,
    },

    /// Invalid configuration detected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Conditions that terminate a scenario run.
///
/// A validation mismatch is not one of these: it is counted as a failure and
/// the run continues, unless fail-fast is enabled.
#[derive(Error, Debug)]
pub enum EvalError {
    /// An `Assistant` or `Pipeline.*` line arrived before any recorded turn.
    #[error("There is no answer yet!")]
    NoPriorTurn,

    /// A role outside the transcript vocabulary.
    #[error("Unknown role: {0}!")]
    UnknownRole(String),

    /// A mismatch while fail-fast is enabled.
    #[error("{role} did not match the expected pattern")]
    FailFast { role: String },

    /// The transcript file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the transcript (or writing the report) failed midway.
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),
}
