use crate::error::ProducerError;
use chrono::Utc;
use connectors::base::requests::FetchRequestBuilder;
use engine_core::connectors::source::Source;
use model::{
    core::identifiers::RunId,
    pagination::{cursor::Cursor, window::WindowPredicate},
    records::batch::Batch,
};
use tracing::{debug, info};

/// Reads one collection's window in fixed-size keyset pages.
#[derive(Clone)]
pub struct BatchExtractor {
    run_id: RunId,
    source: Source,
    chunk_size: usize,
    projection: Option<Vec<String>>,
}

impl BatchExtractor {
    pub fn new(run_id: RunId, source: Source, chunk_size: usize) -> Self {
        Self {
            run_id,
            source,
            chunk_size: chunk_size.max(1),
            projection: None,
        }
    }

    pub fn with_projection(mut self, fields: Option<Vec<String>>) -> Self {
        self.projection = fields;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Counts the window and returns a stream over its chunks. A zero count
    /// yields an exhausted stream without issuing any fetch.
    pub async fn extract(
        &self,
        collection: &str,
        predicate: WindowPredicate,
    ) -> Result<ChunkStream, ProducerError> {
        let total = self
            .source
            .count(collection, &predicate)
            .await
            .map_err(|source| ProducerError::Count {
                collection: collection.to_string(),
                source,
            })?;

        info!(collection, total, "Documents in window");

        Ok(ChunkStream {
            extractor: self.clone(),
            collection: collection.to_string(),
            predicate,
            cursor: Cursor::None,
            total,
            fetched: 0,
            batch_no: 0,
            done: total == 0,
        })
    }

    fn batch_id(&self, collection: &str, batch_no: usize, cursor: &Cursor) -> String {
        let mut h = blake3::Hasher::new();
        h.update(self.run_id.as_str().as_bytes());
        h.update(collection.as_bytes());
        h.update(&batch_no.to_le_bytes());
        h.update(format!("{cursor:?}").as_bytes());
        h.finalize().to_hex().to_string()
    }
}

/// Chunks of one collection, in `(window key, _id)` order.
pub struct ChunkStream {
    extractor: BatchExtractor,
    collection: String,
    predicate: WindowPredicate,
    cursor: Cursor,
    total: u64,
    fetched: u64,
    batch_no: usize,
    done: bool,
}

impl ChunkStream {
    /// Count taken before the first fetch.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn fetched(&self) -> u64 {
        self.fetched
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Batch>, ProducerError> {
        if self.done {
            return Ok(None);
        }

        let request = FetchRequestBuilder::new(self.collection.clone(), self.predicate.clone())
            .after(self.cursor.clone())
            .limit(self.extractor.chunk_size)
            .projection(self.extractor.projection.clone())
            .build();

        let rows = self
            .extractor
            .source
            .fetch_data(&request)
            .await
            .map_err(|source| ProducerError::Fetch {
                collection: self.collection.clone(),
                cursor: self.cursor.clone(),
                source,
            })?;

        if rows.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let next = rows
            .last()
            .and_then(|last| Cursor::after_document(&self.predicate, last));
        if rows.len() < self.extractor.chunk_size || next.is_none() {
            self.done = true;
        }

        let batch_no = self.batch_no;
        let next = next.unwrap_or(Cursor::None);
        let batch = Batch {
            id: self
                .extractor
                .batch_id(&self.collection, batch_no, &self.cursor),
            collection: self.collection.clone(),
            batch_no,
            cursor: std::mem::replace(&mut self.cursor, next.clone()),
            next,
            rows,
            ts: Utc::now(),
        };

        self.batch_no += 1;
        self.fetched += batch.len() as u64;
        debug!(
            collection = %self.collection,
            batch_no,
            rows = batch.len(),
            "Fetched chunk"
        );
        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use chrono::{DateTime, TimeZone};
    use connectors::memory::MemoryStore;
    use std::sync::Arc;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 12, 10, minute, 0).unwrap()
    }

    fn predicate() -> WindowPredicate {
        WindowPredicate::Timestamp {
            field: "InsertOn".into(),
            start: at(0),
            end: at(30),
        }
    }

    fn extractor(store: &MemoryStore, chunk_size: usize) -> BatchExtractor {
        let source = Source::new("logs", Arc::new(store.clone()));
        BatchExtractor::new(RunId::new("run-1"), source, chunk_size)
    }

    #[tokio::test]
    async fn pages_through_the_window_without_gaps() {
        let store = MemoryStore::new();
        // several documents share a timestamp so pages split inside a tie
        store.seed(
            "logs",
            (0..7).map(|i| {
                doc! { "_id": i, "InsertOn": bson::DateTime::from_chrono(at(10 + (i as u32 / 3))) }
            }),
        );
        store.seed(
            "logs",
            vec![doc! { "_id": 99, "InsertOn": bson::DateTime::from_chrono(at(45)) }],
        );

        let mut stream = extractor(&store, 2).extract("logs", predicate()).await.unwrap();
        assert_eq!(stream.total(), 7);

        let mut seen = Vec::new();
        let mut ids = Vec::new();
        while let Some(batch) = stream.next_chunk().await.unwrap() {
            assert!(batch.len() <= 2);
            ids.push(batch.id.clone());
            seen.extend(batch.rows.iter().map(|d| d.get_i32("_id").unwrap()));
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(stream.fetched(), 7);
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn empty_window_issues_no_fetch() {
        let store = MemoryStore::new();
        store.seed(
            "logs",
            vec![doc! { "_id": 1, "InsertOn": bson::DateTime::from_chrono(at(50)) }],
        );

        let mut stream = extractor(&store, 10).extract("logs", predicate()).await.unwrap();
        assert_eq!(stream.total(), 0);
        assert!(stream.next_chunk().await.unwrap().is_none());
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let store = MemoryStore::new();
        store.fail_collection("logs");
        let err = extractor(&store, 10)
            .extract("logs", predicate())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProducerError::Count { .. }));
    }
}
