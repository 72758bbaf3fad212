use crate::stage::Stage;
use serde::{Deserialize, Serialize};

/// Working state of one turn, handed from stage to stage by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Turns so far in the current story, oldest first.
    pub history: Vec<HistoryEntry>,

    /// The user's question. Set before any stage runs.
    pub inquiry: String,

    pub thought: String,
    pub keyphrases: String,
    pub topic: String,
    pub observation: String,

    /// Empty until a terminal stage completes.
    pub answer: String,
}

impl Context {
    pub fn new(inquiry: impl Into<String>) -> Self {
        Self {
            inquiry: inquiry.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    /// Last `n` history entries, fewer when the history is shorter.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

/// Record of one completed turn.
///
/// Entries are appended, never edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub inquiry: String,
    pub thought: String,
    pub keyphrases: String,
    pub topic: String,
    pub observation: String,
    pub answer: String,

    /// Wall-clock time of the whole turn, in milliseconds.
    pub duration: u64,

    /// Raw enter/leave log of the turn.
    pub stages: Vec<Stage>,
}

impl HistoryEntry {
    /// Snapshot of a finished turn.
    pub fn from_turn(result: &Context, duration: u64, stages: Vec<Stage>) -> Self {
        Self {
            inquiry: result.inquiry.clone(),
            thought: result.thought.clone(),
            keyphrases: result.keyphrases.clone(),
            topic: result.topic.clone(),
            observation: result.observation.clone(),
            answer: result.answer.clone(),
            duration,
            stages,
        }
    }
}
