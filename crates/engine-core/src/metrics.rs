use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, ops::AddAssign};

/// Per-collection counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTotals {
    pub extracted: u64,
    pub processed: u64,
    pub quarantined: u64,
    pub skipped_duplicates: u64,
    pub inserted: u64,
    pub insert_failed: u64,
    pub quarantine_inserted: u64,
    pub quarantine_failed: u64,
    pub batches: u64,
}

impl CollectionTotals {
    /// Documents with a classification outcome.
    pub fn accounted(&self) -> u64 {
        self.processed + self.quarantined + self.skipped_duplicates
    }

    /// Every extracted document is processed, quarantined or skipped.
    pub fn is_balanced(&self) -> bool {
        self.accounted() == self.extracted
    }
}

impl AddAssign for CollectionTotals {
    fn add_assign(&mut self, other: Self) {
        self.extracted += other.extracted;
        self.processed += other.processed;
        self.quarantined += other.quarantined;
        self.skipped_duplicates += other.skipped_duplicates;
        self.inserted += other.inserted;
        self.insert_failed += other.insert_failed;
        self.quarantine_inserted += other.quarantine_inserted;
        self.quarantine_failed += other.quarantine_failed;
        self.batches += other.batches;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFailure {
    pub collection: String,
    pub reason: String,
}

/// Counters of one run, owned by its coordinator and returned by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub collections: BTreeMap<String, CollectionTotals>,
    pub skipped_collections: Vec<String>,
    pub failed_collections: Vec<CollectionFailure>,
}

impl RunTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, collection: &str, totals: CollectionTotals) {
        *self.collections.entry(collection.to_string()).or_default() += totals;
    }

    pub fn skip(&mut self, collection: &str) {
        self.skipped_collections.push(collection.to_string());
    }

    pub fn fail(&mut self, collection: &str, reason: impl Into<String>) {
        self.failed_collections.push(CollectionFailure {
            collection: collection.to_string(),
            reason: reason.into(),
        });
    }

    pub fn overall(&self) -> CollectionTotals {
        self.collections
            .values()
            .fold(CollectionTotals::default(), |mut acc, t| {
                acc += *t;
                acc
            })
    }

    pub fn get(&self, collection: &str) -> Option<&CollectionTotals> {
        self.collections.get(collection)
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_collections.is_empty()
    }
}
