use crate::{
    error::StateStoreError,
    metrics::RunTotals,
    state::{StateStore, models::JournalEntry},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, sync::Arc};

/// Phases of one pipeline run. `Aborted` is reachable from every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Init,
    WindowResolved,
    Extracting,
    Loading,
    Done,
    Aborted,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Init => "INIT",
            RunPhase::WindowResolved => "WINDOW_RESOLVED",
            RunPhase::Extracting => "EXTRACTING",
            RunPhase::Loading => "LOADING",
            RunPhase::Done => "DONE",
            RunPhase::Aborted => "ABORTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Started without a terminal entry: still running, or killed.
    Incomplete,
    Finished,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Incomplete => "Incomplete",
            RunStatus::Finished => "Finished",
            RunStatus::Aborted => "Aborted",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub totals: Option<RunTotals>,
    pub reason: Option<String>,
}

impl RunSummary {
    fn new(run_id: &str) -> Self {
        RunSummary {
            run_id: run_id.to_string(),
            status: RunStatus::Incomplete,
            started_at: None,
            window_start: None,
            window_end: None,
            ended_at: None,
            totals: None,
            reason: None,
        }
    }
}

/// Folds the run journal into one summary per run.
#[derive(Clone)]
pub struct HistoryService {
    pub store: Arc<dyn StateStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        HistoryService { store }
    }

    /// Runs of `pipeline`, oldest first.
    pub async fn runs(&self, pipeline: &str) -> Result<Vec<RunSummary>, StateStoreError> {
        let entries = self.store.entries(pipeline).await?;
        let mut runs: Vec<RunSummary> = Vec::new();

        for entry in entries {
            let idx = match runs.iter().position(|r| r.run_id == entry.run_id()) {
                Some(idx) => idx,
                None => {
                    runs.push(RunSummary::new(entry.run_id()));
                    runs.len() - 1
                }
            };
            let run = &mut runs[idx];

            match entry {
                JournalEntry::RunStarted {
                    window_start,
                    window_end,
                    at,
                    ..
                } => {
                    run.started_at = Some(at);
                    run.window_start = Some(window_start);
                    run.window_end = Some(window_end);
                }
                JournalEntry::RunFinished { totals, at, .. } => {
                    run.status = RunStatus::Finished;
                    run.totals = Some(totals);
                    run.ended_at = Some(at);
                }
                JournalEntry::RunAborted { reason, at, .. } => {
                    run.status = RunStatus::Aborted;
                    run.reason = Some(reason);
                    run.ended_at = Some(at);
                }
            }
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::sled_store::SledStateStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn summarizes_finished_aborted_and_incomplete_runs() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let now = Utc::now();

        for run_id in ["r1", "r2", "r3"] {
            store
                .append(&JournalEntry::RunStarted {
                    pipeline: "search".into(),
                    run_id: run_id.into(),
                    window_start: now,
                    window_end: now,
                    at: now,
                })
                .await
                .unwrap();
        }
        store
            .append(&JournalEntry::RunFinished {
                pipeline: "search".into(),
                run_id: "r1".into(),
                totals: RunTotals::new(),
                at: now,
            })
            .await
            .unwrap();
        store
            .append(&JournalEntry::RunAborted {
                pipeline: "search".into(),
                run_id: "r2".into(),
                reason: "cancelled".into(),
                at: now,
            })
            .await
            .unwrap();

        let runs = HistoryService::new(store).runs("search").await.unwrap();
        let statuses: Vec<_> = runs.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![RunStatus::Finished, RunStatus::Aborted, RunStatus::Incomplete]
        );
        assert_eq!(runs[1].reason.as_deref(), Some("cancelled"));
    }

    #[test]
    fn phase_names() {
        assert_eq!(RunPhase::WindowResolved.to_string(), "WINDOW_RESOLVED");
        assert!(RunPhase::Aborted.is_terminal());
        assert!(!RunPhase::Loading.is_terminal());
    }
}
