use crate::{
    error::StateStoreError,
    state::{StateStore, models::JournalEntry},
};
use async_trait::async_trait;
use std::path::Path;

pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path).map_err(StateStoreError::Open)?;
        Ok(Self { db })
    }

    /// Keys sort in append order within a pipeline.
    #[inline]
    fn wal_key(pipeline: &str, seq: u64) -> String {
        format!("wal:{pipeline}:{seq:020}")
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn append(&self, entry: &JournalEntry) -> Result<(), StateStoreError> {
        let seq = self
            .db
            .generate_id()
            .map_err(|e| StateStoreError::Append(e.to_string()))?;
        let key = Self::wal_key(entry.pipeline(), seq);
        let value = bincode::serialize(entry).map_err(|e| StateStoreError::Append(e.to_string()))?;

        self.db
            .insert(key, value)
            .map_err(|e| StateStoreError::Append(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| StateStoreError::Append(e.to_string()))?;
        Ok(())
    }

    async fn entries(&self, pipeline: &str) -> Result<Vec<JournalEntry>, StateStoreError> {
        let prefix = format!("wal:{pipeline}:");
        let mut entries = Vec::new();

        for item in self.db.scan_prefix(prefix) {
            let (_key, value) = item.map_err(|e| StateStoreError::Read(e.to_string()))?;
            let entry: JournalEntry =
                bincode::deserialize(&value).map_err(|e| StateStoreError::Read(e.to_string()))?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CollectionTotals, RunTotals};
    use chrono::Utc;
    use tempfile::tempdir;

    fn started(pipeline: &str, run_id: &str) -> JournalEntry {
        let now = Utc::now();
        JournalEntry::RunStarted {
            pipeline: pipeline.into(),
            run_id: run_id.into(),
            window_start: now,
            window_end: now,
            at: now,
        }
    }

    #[tokio::test]
    async fn entries_come_back_in_append_order() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        let mut totals = RunTotals::new();
        totals.record(
            "fs_reprice_rs",
            CollectionTotals {
                extracted: 4,
                processed: 4,
                inserted: 4,
                ..Default::default()
            },
        );

        store.append(&started("repricing", "r1")).await.unwrap();
        store
            .append(&JournalEntry::RunFinished {
                pipeline: "repricing".into(),
                run_id: "r1".into(),
                totals: totals.clone(),
                at: Utc::now(),
            })
            .await
            .unwrap();

        let entries = store.entries("repricing").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], JournalEntry::RunStarted { .. }));
        match &entries[1] {
            JournalEntry::RunFinished { totals: t, .. } => assert_eq!(t, &totals),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[tokio::test]
    async fn pipelines_are_kept_apart() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        store.append(&started("ecom", "a")).await.unwrap();
        store.append(&started("ecom_extra", "b")).await.unwrap();

        let entries = store.entries("ecom").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].run_id(), "a");
    }
}
