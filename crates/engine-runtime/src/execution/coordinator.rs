use crate::error::{CollectionError, RunError};
use chrono::{DateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use engine_config::settings::PipelineSettings;
use engine_core::{
    connectors::{destination::Destination, source::Source},
    lock::{LockMarker, RunLock},
    metrics::{CollectionTotals, RunTotals},
    progress::RunPhase,
    state::{StateStore, models::JournalEntry, sled_store::SledStateStore},
};
use engine_processing::{
    consumer::{dedup::Deduplicator, writer::BulkLoader},
    producer::reader::BatchExtractor,
    transform::{classifier::RecordClassifier, pipeline::TransformContext},
    watermark::WatermarkTracker,
};
use model::{
    core::{identifiers::RunId, provenance::Provenance},
    pagination::window::{RunWindow, WindowPredicate},
};
use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Source of the run's start instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wall clock truncated to the millisecond precision BSON dates store, so
/// the watermark read back equals the one written.
pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().trunc_subsecs(3))
}

pub struct RunParams {
    pub pipeline: PipelineSettings,
    pub source: Source,
    pub destination: Destination,
    pub chunk_size: usize,
    pub default_lookback: Duration,
    pub timezone: Tz,
    pub lock_dir: PathBuf,
    pub journal_dir: PathBuf,
    pub clock: Clock,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline: String,
    pub run_id: RunId,
    pub window: Option<RunWindow>,
    pub totals: RunTotals,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run holds the lock; nothing was touched.
    Skipped {
        pipeline: String,
        holder: Option<LockMarker>,
    },
    Aborted {
        report: RunReport,
        reason: String,
    },
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Aborted { report, .. } => Some(report),
            RunOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Drives one pipeline run from lock acquisition to cleanup.
pub struct RunCoordinator {
    pipeline: PipelineSettings,
    source: Source,
    destination: Destination,
    chunk_size: usize,
    default_lookback: Duration,
    timezone: Tz,
    lock: RunLock,
    journal_dir: PathBuf,
    clock: Clock,
    cancel: CancellationToken,
    phase: RunPhase,
}

/// What a run has accumulated so far; survives an abort.
struct RunState {
    run_id: RunId,
    window: Option<RunWindow>,
    totals: RunTotals,
}

/// Per-run components shared by every collection.
struct CollectionJob {
    extractor: BatchExtractor,
    predicate: WindowPredicate,
    classifier: RecordClassifier,
    dedup: Option<Deduplicator>,
    loader: BulkLoader,
    destination: String,
    quarantine: String,
}

impl RunCoordinator {
    pub fn new(params: RunParams) -> Self {
        let lock = RunLock::new(&params.lock_dir, &params.pipeline.name);
        Self {
            pipeline: params.pipeline,
            source: params.source,
            destination: params.destination,
            chunk_size: params.chunk_size,
            default_lookback: params.default_lookback,
            timezone: params.timezone,
            lock,
            journal_dir: params.journal_dir,
            clock: params.clock,
            cancel: params.cancel,
            phase: RunPhase::Init,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        if self.phase == phase {
            return;
        }
        debug!(pipeline = %self.pipeline.name, from = %self.phase, to = %phase, "Run phase");
        self.phase = phase;
    }

    pub async fn run(mut self) -> Result<RunOutcome, RunError> {
        let started = Instant::now();
        let run_id = RunId::generate();
        self.enter(RunPhase::Init);

        let Some(guard) = self.lock.try_acquire(run_id.as_str())? else {
            let holder = self.lock.holder().unwrap_or_else(|e| {
                warn!(pipeline = %self.pipeline.name, error = %e, "Unreadable lock marker");
                None
            });
            warn!(
                pipeline = %self.pipeline.name,
                holder = ?holder.as_ref().map(|h| h.run_id.as_str()),
                "Another run is in progress, exiting"
            );
            return Ok(RunOutcome::Skipped {
                pipeline: self.pipeline.name.clone(),
                holder,
            });
        };

        // The guard removes the marker on drop if opening the journal fails.
        let journal = SledStateStore::open(&self.journal_dir)?;

        let mut state = RunState {
            run_id,
            window: None,
            totals: RunTotals::new(),
        };
        let result = self.execute(&mut state, &journal).await;

        let now = Utc::now();
        let outcome = match result {
            Ok(()) => {
                self.enter(RunPhase::Done);
                let entry = JournalEntry::RunFinished {
                    pipeline: self.pipeline.name.clone(),
                    run_id: state.run_id.to_string(),
                    totals: state.totals.clone(),
                    at: now,
                };
                self.journal(&journal, &entry).await;
                RunOutcome::Completed(self.report(state, started))
            }
            Err(err) => {
                self.enter(RunPhase::Aborted);
                error!(pipeline = %self.pipeline.name, error = %err, "Run aborted");
                let reason = err.to_string();
                let entry = JournalEntry::RunAborted {
                    pipeline: self.pipeline.name.clone(),
                    run_id: state.run_id.to_string(),
                    reason: reason.clone(),
                    at: now,
                };
                self.journal(&journal, &entry).await;
                RunOutcome::Aborted {
                    report: self.report(state, started),
                    reason,
                }
            }
        };

        if let Err(e) = guard.release() {
            error!(pipeline = %self.pipeline.name, error = %e, "Failed to release run lock");
        }
        info!("--- End of Run at {} ---", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
        Ok(outcome)
    }

    async fn execute(&mut self, state: &mut RunState, journal: &dyn StateStore) -> Result<(), RunError> {
        let now = (self.clock)();
        info!("--- Start of Run at {} ---", now.format("%Y-%m-%d %H:%M:%S UTC"));

        let quarantine = self.pipeline.quarantine_collection();
        let tracker = WatermarkTracker::new(
            self.destination.clone(),
            vec![self.pipeline.destination.collection.clone(), quarantine.clone()],
            self.default_lookback,
        );
        let start = tracker.resolve(now).await?;
        let window = RunWindow::new(start, now)?;
        state.window = Some(window);
        self.enter(RunPhase::WindowResolved);

        let provenance = Provenance::for_window(&window, self.timezone);
        info!(
            pipeline = %self.pipeline.name,
            run_id = %state.run_id,
            time_range = %provenance.time_range(),
            "Processing window resolved"
        );
        journal
            .append(&JournalEntry::RunStarted {
                pipeline: self.pipeline.name.clone(),
                run_id: state.run_id.to_string(),
                window_start: window.start(),
                window_end: window.end(),
                at: Utc::now(),
            })
            .await?;

        let available: HashSet<String> = self
            .source
            .collection_names()
            .await
            .map_err(RunError::ListCollections)?
            .into_iter()
            .collect();

        let job = self.job(state, &window, provenance, quarantine);
        self.enter(RunPhase::Extracting);

        let collections = self.pipeline.collections.clone();
        let total_collections = collections.len();
        for (idx, collection) in collections.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    "Shutdown requested before collection {}/{}: {}",
                    idx + 1,
                    total_collections,
                    collection
                );
                return Err(RunError::ShutdownRequested);
            }

            if !available.contains(collection) {
                warn!(collection = %collection, "Collection not found at source, skipping");
                state.totals.skip(collection);
                continue;
            }

            info!(
                "Processing collection {}/{}: {}",
                idx + 1,
                total_collections,
                collection
            );

            let mut totals = CollectionTotals::default();
            let result = self
                .process_collection(&job, collection, &mut totals)
                .await;
            state.totals.record(collection, totals);

            match result {
                Ok(()) => {}
                Err(CollectionError::Cancelled) => return Err(RunError::ShutdownRequested),
                Err(err) => {
                    error!(collection = %collection, error = %err, "Collection failed, continuing with the next one");
                    state.totals.fail(collection, err.to_string());
                }
            }
        }

        self.log_totals(&state.totals);
        Ok(())
    }

    fn job(
        &self,
        state: &RunState,
        window: &RunWindow,
        provenance: Provenance,
        quarantine: String,
    ) -> CollectionJob {
        let destination = self.pipeline.destination.collection.clone();
        let dedup = self.pipeline.dedup_key.as_ref().map(|key| {
            Deduplicator::new(
                self.destination.clone(),
                key.clone(),
                vec![destination.clone(), quarantine.clone()],
            )
        });

        CollectionJob {
            extractor: BatchExtractor::new(state.run_id.clone(), self.source.clone(), self.chunk_size)
                .with_projection(self.pipeline.projection()),
            predicate: WindowPredicate::new(&self.pipeline.window, window, self.timezone),
            classifier: RecordClassifier::for_pipeline(&self.pipeline, provenance),
            dedup,
            loader: BulkLoader::new(self.destination.clone()),
            destination,
            quarantine,
        }
    }

    /// Extract, classify and load one collection chunk by chunk. `totals`
    /// holds whatever was counted before an error.
    async fn process_collection(
        &mut self,
        job: &CollectionJob,
        collection: &str,
        totals: &mut CollectionTotals,
    ) -> Result<(), CollectionError> {
        let mut stream = job.extractor.extract(collection, job.predicate.clone()).await?;
        if stream.is_done() {
            info!(collection, "No documents found in window");
            return Ok(());
        }

        let ctx = TransformContext::new(collection);
        loop {
            if self.cancel.is_cancelled() {
                warn!(collection, fetched = stream.fetched(), "Shutdown requested, stopping between chunks");
                return Err(CollectionError::Cancelled);
            }

            self.enter(RunPhase::Extracting);
            let Some(batch) = stream.next_chunk().await? else {
                break;
            };
            let batch_no = batch.batch_no;
            let batch_id = batch.id;
            totals.batches += 1;
            totals.extracted += batch.rows.len() as u64;

            let rows = match &job.dedup {
                Some(dedup) => {
                    let fresh = dedup.retain_new(batch.rows).await?;
                    totals.skipped_duplicates += fresh.skipped as u64;
                    fresh.rows
                }
                None => batch.rows,
            };

            let classified = job.classifier.classify_all(&rows, &ctx);
            totals.processed += classified.records.len() as u64;
            totals.quarantined += classified.quarantined.len() as u64;

            self.enter(RunPhase::Loading);
            let records = classified
                .records
                .into_iter()
                .map(|r| r.into_document())
                .collect();
            let loaded = job.loader.load(&job.destination, &batch_id, records).await?;
            totals.inserted += loaded.inserted as u64;
            totals.insert_failed += loaded.failed as u64;

            let quarantined = classified
                .quarantined
                .into_iter()
                .map(|q| q.into_document())
                .collect();
            let loaded = job.loader.load(&job.quarantine, &batch_id, quarantined).await?;
            totals.quarantine_inserted += loaded.inserted as u64;
            totals.quarantine_failed += loaded.failed as u64;

            info!(
                collection,
                batch_no,
                fetched = stream.fetched(),
                total = stream.total(),
                processed = totals.processed,
                quarantined = totals.quarantined,
                "Chunk processed"
            );
        }

        info!(
            collection,
            extracted = totals.extracted,
            processed = totals.processed,
            quarantined = totals.quarantined,
            skipped_duplicates = totals.skipped_duplicates,
            inserted = totals.inserted,
            failed = totals.insert_failed,
            "Collection complete"
        );
        Ok(())
    }

    fn log_totals(&self, totals: &RunTotals) {
        for (collection, t) in &totals.collections {
            if !t.is_balanced() {
                warn!(collection = %collection, extracted = t.extracted, accounted = t.accounted(), "Collection totals do not balance");
            }
        }
        let overall = totals.overall();
        info!(
            pipeline = %self.pipeline.name,
            extracted = overall.extracted,
            processed = overall.processed,
            quarantined = overall.quarantined,
            skipped_duplicates = overall.skipped_duplicates,
            inserted = overall.inserted,
            failed = overall.insert_failed + overall.quarantine_failed,
            skipped_collections = totals.skipped_collections.len(),
            failed_collections = totals.failed_collections.len(),
            "Run totals"
        );
    }

    async fn journal(&self, journal: &dyn StateStore, entry: &JournalEntry) {
        if let Err(e) = journal.append(entry).await {
            warn!(pipeline = %self.pipeline.name, error = %e, "Failed to append run journal entry");
        }
    }

    fn report(&self, state: RunState, started: Instant) -> RunReport {
        RunReport {
            pipeline: self.pipeline.name.clone(),
            run_id: state.run_id,
            window: state.window,
            totals: state.totals,
            duration: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_has_millisecond_precision() {
        let now = (system_clock())();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn skipped_outcome_has_no_report() {
        let outcome = RunOutcome::Skipped {
            pipeline: "ecom".into(),
            holder: None,
        };
        assert!(outcome.report().is_none());
        assert!(!outcome.is_completed());

        let report = RunReport {
            pipeline: "ecom".into(),
            run_id: RunId::new("r1"),
            window: RunWindow::new(
                Utc.with_ymd_and_hms(2025, 4, 12, 9, 50, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 4, 12, 10, 0, 0).unwrap(),
            )
            .ok(),
            totals: RunTotals::new(),
            duration: Duration::ZERO,
        };
        assert!(RunOutcome::Completed(report).is_completed());
    }
}
