//! In-process document store implementing both storage seams.
//!
//! Backs the `memory://` connection scheme and the end-to-end tests. Every
//! collection access is counted so callers can assert that nothing was read
//! or written.

use crate::{
    base::{
        destination::DocumentDestination,
        requests::{FetchRequest, InsertReport, WriteFailure},
        source::DocumentSource,
    },
    error::AdapterError,
};
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use model::{
    core::{identifiers::DocKey, value::compare_ids},
    pagination::{cursor::Cursor, window::WindowPredicate},
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, Vec<Document>>,
    indexes: BTreeSet<(String, String)>,
    failing: HashSet<String>,
    reads: u64,
    writes: u64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts documents without counting the operation.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut inner = self.lock();
        let coll = inner.collections.entry(collection.to_string()).or_default();
        for mut doc in docs {
            if !doc.contains_key("_id") {
                doc.insert("_id", ObjectId::new());
            }
            coll.push(doc);
        }
    }

    /// Snapshot of a collection in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every operation touching `collection` fail.
    pub fn fail_collection(&self, collection: &str) {
        self.lock().failing.insert(collection.to_string());
    }

    pub fn has_index(&self, collection: &str, field: &str) -> bool {
        self.lock()
            .indexes
            .contains(&(collection.to_string(), field.to_string()))
    }

    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    pub fn operations(&self) -> u64 {
        let inner = self.lock();
        inner.reads + inner.writes
    }

    fn check(inner: &Inner, collection: &str) -> Result<(), AdapterError> {
        if inner.failing.contains(collection) {
            return Err(AdapterError::Generic(format!(
                "collection '{collection}' is unavailable"
            )));
        }
        Ok(())
    }
}

fn keyset_order(predicate: &WindowPredicate, a: &Document, b: &Document) -> Ordering {
    let ka = Cursor::after_document(predicate, a).unwrap_or(Cursor::None);
    let kb = Cursor::after_document(predicate, b).unwrap_or(Cursor::None);
    ka.compare(&kb).unwrap_or(Ordering::Equal)
}

fn project(doc: &Document, fields: &[String]) -> Document {
    let mut out = Document::new();
    for field in fields {
        if let Some(value) = doc.get(field) {
            out.insert(field.as_str(), value.clone());
        }
    }
    out
}

#[async_trait]
impl DocumentSource for MemoryStore {
    async fn collection_names(&self) -> Result<Vec<String>, AdapterError> {
        let mut inner = self.lock();
        inner.reads += 1;
        Ok(inner.collections.keys().cloned().collect())
    }

    async fn count(
        &self,
        collection: &str,
        predicate: &WindowPredicate,
    ) -> Result<u64, AdapterError> {
        let mut inner = self.lock();
        inner.reads += 1;
        Self::check(&inner, collection)?;
        let count = inner
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| predicate.matches(d)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Document>, AdapterError> {
        let mut inner = self.lock();
        inner.reads += 1;
        Self::check(&inner, &request.collection)?;

        let mut page: Vec<&Document> = inner
            .collections
            .get(&request.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| request.predicate.matches(d))
                    .filter(|d| request.after.precedes(&request.predicate, d))
                    .collect()
            })
            .unwrap_or_default();
        page.sort_by(|a, b| keyset_order(&request.predicate, a, b));

        Ok(page
            .into_iter()
            .take(request.limit)
            .map(|d| match &request.projection {
                Some(fields) => project(d, fields),
                None => d.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl DocumentDestination for MemoryStore {
    async fn latest(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<Document>, AdapterError> {
        let mut inner = self.lock();
        inner.reads += 1;
        Self::check(&inner, collection)?;

        Ok(inner.collections.get(collection).and_then(|docs| {
            docs.iter()
                .filter_map(|d| d.get(field).map(|v| (v, d)))
                .max_by(|(a, _), (b, _)| compare_ids(a, b))
                .map(|(_, d)| d.clone())
        }))
    }

    async fn existing_keys(
        &self,
        collection: &str,
        field: &str,
        values: &[Bson],
    ) -> Result<Vec<Bson>, AdapterError> {
        let mut inner = self.lock();
        inner.reads += 1;
        Self::check(&inner, collection)?;

        let wanted: HashSet<DocKey> = values.iter().map(DocKey::of).collect();
        Ok(inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter_map(|d| d.get(field))
                    .filter(|id| wanted.contains(&DocKey::of(id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertReport, AdapterError> {
        let mut inner = self.lock();
        inner.writes += 1;
        Self::check(&inner, collection)?;

        let attempted = docs.len();
        let coll = inner.collections.entry(collection.to_string()).or_default();
        let mut seen: HashSet<DocKey> = coll
            .iter()
            .filter_map(|d| d.get("_id"))
            .map(DocKey::of)
            .collect();

        let mut failures = Vec::new();
        for (index, mut doc) in docs.into_iter().enumerate() {
            let id = match doc.get("_id") {
                Some(id) => id.clone(),
                None => {
                    let id = Bson::ObjectId(ObjectId::new());
                    doc.insert("_id", id.clone());
                    id
                }
            };
            let key = DocKey::of(&id);
            if seen.contains(&key) {
                failures.push(WriteFailure {
                    index,
                    code: DUPLICATE_KEY,
                    message: format!(
                        "E11000 duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {id} }}"
                    ),
                });
                continue;
            }
            seen.insert(key);
            coll.push(doc);
        }

        Ok(InsertReport::from_failures(attempted, failures))
    }

    async fn ensure_index(&self, collection: &str, field: &str) -> Result<(), AdapterError> {
        let mut inner = self.lock();
        inner.writes += 1;
        Self::check(&inner, collection)?;
        inner
            .indexes
            .insert((collection.to_string(), field.to_string()));
        Ok(())
    }
}

/// Named databases of a `memory://` connection.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    databases: Arc<Mutex<HashMap<String, MemoryStore>>>,
}

impl MemoryCluster {
    pub fn database(&self, name: &str) -> MemoryStore {
        self.databases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::requests::FetchRequestBuilder;
    use bson::doc;
    use chrono::{TimeZone, Utc};

    fn at(minute: u32) -> bson::DateTime {
        bson::DateTime::from_chrono(Utc.with_ymd_and_hms(2025, 4, 12, 10, minute, 0).unwrap())
    }

    fn predicate() -> WindowPredicate {
        WindowPredicate::Timestamp {
            field: "InsertOn".into(),
            start: at(0).to_chrono(),
            end: at(30).to_chrono(),
        }
    }

    #[tokio::test]
    async fn pages_in_keyset_order() {
        let store = MemoryStore::new();
        store.seed(
            "logs",
            vec![
                doc! { "_id": 3, "InsertOn": at(5) },
                doc! { "_id": 1, "InsertOn": at(5) },
                doc! { "_id": 2, "InsertOn": at(1) },
                doc! { "_id": 4, "InsertOn": at(45) },
            ],
        );

        let first = store
            .fetch(&FetchRequestBuilder::new("logs", predicate()).limit(2).build())
            .await
            .unwrap();
        let ids: Vec<_> = first.iter().map(|d| d.get_i32("_id").unwrap()).collect();
        assert_eq!(ids, vec![2, 1]);

        let after = Cursor::after_document(&predicate(), &first[1]).unwrap();
        let second = store
            .fetch(
                &FetchRequestBuilder::new("logs", predicate())
                    .after(after)
                    .limit(2)
                    .build(),
            )
            .await
            .unwrap();
        let ids: Vec<_> = second.iter().map(|d| d.get_i32("_id").unwrap()).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(store.count("logs", &predicate()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_ids_are_partial_failures() {
        let store = MemoryStore::new();
        store.seed("out", vec![doc! { "_id": "X" }]);

        let report = store
            .insert_many("out", vec![doc! { "_id": "X" }, doc! { "_id": "Y" }])
            .await
            .unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].code, DUPLICATE_KEY);
    }

    #[tokio::test]
    async fn latest_and_existing_keys() {
        let store = MemoryStore::new();
        store.seed(
            "out",
            vec![
                doc! { "_id": "a", "Processing_Time": at(1) },
                doc! { "_id": "b", "Processing_Time": at(9) },
                doc! { "_id": "c" },
            ],
        );

        let latest = store.latest("out", "Processing_Time").await.unwrap().unwrap();
        assert_eq!(latest.get_str("_id").unwrap(), "b");

        let found = store
            .existing_keys("out", "_id", &[Bson::from("a"), Bson::from("z")])
            .await
            .unwrap();
        assert_eq!(found, vec![Bson::from("a")]);
        assert_eq!(store.reads(), 2);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn failing_collection_errors() {
        let store = MemoryStore::new();
        store.fail_collection("broken");
        assert!(store.count("broken", &predicate()).await.is_err());
        assert!(store.insert_many("broken", vec![doc! {}]).await.is_err());
    }

    #[test]
    fn cluster_returns_shared_databases() {
        let cluster = MemoryCluster::default();
        cluster.database("db").seed("c", vec![doc! { "_id": 1 }]);
        assert_eq!(cluster.database("db").documents("c").len(), 1);
        assert!(cluster.database("other").documents("c").is_empty());
    }
}
