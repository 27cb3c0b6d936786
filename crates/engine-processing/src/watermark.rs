use crate::error::WatermarkError;
use chrono::{DateTime, Utc};
use engine_core::connectors::destination::Destination;
use model::core::provenance::PROCESSING_TIME;
use std::time::Duration;
use tracing::info;

/// Where the next window starts, read from what earlier runs wrote.
#[derive(Clone)]
pub struct WatermarkTracker {
    destination: Destination,
    collections: Vec<String>,
    default_lookback: Duration,
}

impl WatermarkTracker {
    /// The watermark is the greatest `Processing_Time` across `collections`
    /// (destination and quarantine), since both are stamped by every run.
    pub fn new(destination: Destination, collections: Vec<String>, default_lookback: Duration) -> Self {
        Self {
            destination,
            collections,
            default_lookback,
        }
    }

    /// Latest stored `Processing_Time`, `None` when nothing was written yet.
    pub async fn latest(&self) -> Result<Option<DateTime<Utc>>, WatermarkError> {
        let mut latest: Option<DateTime<Utc>> = None;
        for collection in &self.collections {
            let found = self
                .destination
                .latest(collection, PROCESSING_TIME)
                .await
                .map_err(|source| WatermarkError::Query {
                    collection: collection.clone(),
                    source,
                })?;
            let Some(doc) = found else { continue };

            let ts = doc
                .get_datetime(PROCESSING_TIME)
                .map_err(|_| WatermarkError::InvalidValue {
                    collection: collection.clone(),
                    field: PROCESSING_TIME.to_string(),
                })?
                .to_chrono();
            latest = Some(latest.map_or(ts, |cur| cur.max(ts)));
        }
        Ok(latest)
    }

    /// Window start for a run beginning at `now`. Never later than `now`.
    pub async fn resolve(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, WatermarkError> {
        let start = match self.latest().await? {
            Some(ts) => {
                info!(watermark = %ts, "Resuming from last processing time");
                ts
            }
            None => {
                let lookback = chrono::Duration::from_std(self.default_lookback)
                    .unwrap_or(chrono::Duration::zero());
                let start = now - lookback;
                info!(start = %start, lookback_secs = self.default_lookback.as_secs(), "No watermark found, using default lookback");
                start
            }
        };
        Ok(start.min(now))
    }
}
