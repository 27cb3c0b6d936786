use crate::error::ConsumerError;
use bson::{Bson, Document};
use engine_core::connectors::destination::Destination;
use model::core::identifiers::DocKey;
use std::collections::HashSet;
use tracing::debug;

/// Drops documents whose key is already stored at the destination. Checked
/// one chunk at a time.
#[derive(Clone)]
pub struct Deduplicator {
    destination: Destination,
    key: String,
    collections: Vec<String>,
}

/// Chunk rows that survived deduplication.
#[derive(Debug, Default)]
pub struct Fresh {
    pub rows: Vec<Document>,
    pub skipped: usize,
}

impl Deduplicator {
    /// `collections` are every collection a previous run may have written
    /// the key to.
    pub fn new(destination: Destination, key: impl Into<String>, collections: Vec<String>) -> Self {
        Self {
            destination,
            key: key.into(),
            collections,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Candidates not yet present in any of the collections.
    pub async fn filter_new(&self, candidates: &[Bson]) -> Result<HashSet<DocKey>, ConsumerError> {
        let mut fresh: HashSet<DocKey> = candidates.iter().map(DocKey::of).collect();
        if fresh.is_empty() {
            return Ok(fresh);
        }

        for collection in &self.collections {
            let existing = self
                .destination
                .existing_keys(collection, &self.key, candidates)
                .await
                .map_err(|source| ConsumerError::Lookup {
                    collection: collection.clone(),
                    source,
                })?;
            for value in &existing {
                fresh.remove(&DocKey::of(value));
            }
        }
        Ok(fresh)
    }

    /// Keeps rows whose key is new. Rows without the key are kept.
    pub async fn retain_new(&self, rows: Vec<Document>) -> Result<Fresh, ConsumerError> {
        let candidates: Vec<Bson> = rows
            .iter()
            .filter_map(|row| row.get(&self.key).cloned())
            .collect();
        let fresh = self.filter_new(&candidates).await?;

        let before = rows.len();
        let rows: Vec<Document> = rows
            .into_iter()
            .filter(|row| {
                row.get(&self.key)
                    .is_none_or(|value| fresh.contains(&DocKey::of(value)))
            })
            .collect();
        let skipped = before - rows.len();

        if skipped > 0 {
            debug!(key = %self.key, skipped, "Skipped rows already at destination");
        }
        Ok(Fresh { rows, skipped })
    }
}
