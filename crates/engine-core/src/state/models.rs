use crate::metrics::RunTotals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum JournalEntry {
    RunStarted {
        pipeline: String,
        run_id: String,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    RunFinished {
        pipeline: String,
        run_id: String,
        totals: RunTotals,
        at: DateTime<Utc>,
    },
    RunAborted {
        pipeline: String,
        run_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl JournalEntry {
    pub fn pipeline(&self) -> &str {
        match self {
            JournalEntry::RunStarted { pipeline, .. } => pipeline,
            JournalEntry::RunFinished { pipeline, .. } => pipeline,
            JournalEntry::RunAborted { pipeline, .. } => pipeline,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            JournalEntry::RunStarted { run_id, .. } => run_id,
            JournalEntry::RunFinished { run_id, .. } => run_id,
            JournalEntry::RunAborted { run_id, .. } => run_id,
        }
    }
}
