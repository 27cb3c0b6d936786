use crate::error::ConsumerError;
use bson::Document;
use engine_core::connectors::destination::Destination;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub inserted: usize,
    pub failed: usize,
    pub duration: Duration,
}

/// Unordered bulk inserts. Rejected documents are logged and counted, never
/// retried; a batch-level failure is returned as an error.
#[derive(Clone)]
pub struct BulkLoader {
    destination: Destination,
}

impl BulkLoader {
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    pub async fn load(
        &self,
        collection: &str,
        batch_id: &str,
        records: Vec<Document>,
    ) -> Result<LoadResult, ConsumerError> {
        if records.is_empty() {
            return Ok(LoadResult::default());
        }

        let start = Instant::now();
        let rows = records.len();
        let report = self
            .destination
            .write_batch(collection, records)
            .await
            .map_err(|source| ConsumerError::Write {
                collection: collection.to_string(),
                batch_id: batch_id.to_string(),
                source,
            })?;

        for failure in &report.failures {
            warn!(
                collection,
                batch_id,
                index = failure.index,
                code = failure.code,
                reason = %failure.message,
                "Document rejected by destination"
            );
        }

        let duration = start.elapsed();
        let rows_per_sec = rows as f64 / duration.as_secs_f64().max(f64::EPSILON);
        info!(
            collection,
            batch_id,
            rows,
            inserted = report.inserted,
            failed = report.failed(),
            duration_ms = duration.as_millis(),
            rows_per_sec = %format!("{:.2}", rows_per_sec),
            "Batch written"
        );

        Ok(LoadResult {
            inserted: report.inserted,
            failed: report.failed(),
            duration,
        })
    }
}
