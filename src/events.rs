//! Instrumentation hooks for pipeline stages.
//!
//! Stages report to a [`Delegates`] passed into each run: `enter` before
//! the network call, `leave` after it with the stage's notable outputs, and
//! `stream` for each answer increment. Every hook defaults to a no-op, so
//! implementors override only what they observe.

use crate::codec::Fields;
use crate::stage::Stage;
use std::sync::{Mutex, PoisonError};

/// Observer of one pipeline run.
///
/// # Example
///
/// ```
/// use llm_regress::codec::Fields;
/// use llm_regress::events::Delegates;
///
/// struct Progress;
///
/// impl Delegates for Progress {
///     fn leave(&self, stage: &str, fields: &Fields) {
///         if let Some(k) = fields.get("keyphrases") {
///             println!("[{}] searching for {}", stage, k);
///         }
///     }
/// }
/// ```
pub trait Delegates: Send + Sync {
    fn enter(&self, _stage: &str) {}

    fn leave(&self, _stage: &str, _fields: &Fields) {}

    fn stream(&self, _text: &str) {}

    /// Whether answer increments should be requested from the transport.
    fn streams(&self) -> bool {
        false
    }
}

/// Observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelegates;

impl Delegates for NoDelegates {}

/// Records the raw enter/leave log with wall-clock timestamps.
#[derive(Debug, Default)]
pub struct StageRecorder {
    stages: Mutex<Vec<Stage>>,
}

impl StageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded log.
    pub fn take(&self) -> Vec<Stage> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Stage>> {
        self.stages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Delegates for StageRecorder {
    fn enter(&self, stage: &str) {
        self.lock().push(Stage::enter(stage, now_millis()));
    }

    fn leave(&self, stage: &str, fields: &Fields) {
        self.lock()
            .push(Stage::leave(stage, now_millis(), fields.clone()));
    }
}
