use crate::{
    base::{
        destination::DocumentDestination,
        requests::{InsertReport, WriteFailure},
    },
    error::AdapterError,
    mongo::adapter::MongoAdapter,
};
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures_util::TryStreamExt;
use mongodb::{Database, IndexModel, error::ErrorKind};
use tracing::info;

pub struct MongoDestination {
    db: Database,
}

impl MongoDestination {
    pub fn new(adapter: &MongoAdapter, database: &str) -> Self {
        MongoDestination {
            db: adapter.database(database),
        }
    }
}

#[async_trait]
impl DocumentDestination for MongoDestination {
    async fn latest(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<Document>, AdapterError> {
        let mut filter = Document::new();
        filter.insert(field, doc! { "$exists": true });
        let mut sort = Document::new();
        sort.insert(field, -1);

        self.db
            .collection::<Document>(collection)
            .find_one(filter)
            .sort(sort)
            .await
            .map_err(|e| AdapterError::query(collection, e))
    }

    async fn existing_keys(
        &self,
        collection: &str,
        field: &str,
        values: &[Bson],
    ) -> Result<Vec<Bson>, AdapterError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let mut filter = Document::new();
        filter.insert(field, doc! { "$in": values.to_vec() });
        let mut projection = Document::new();
        projection.insert(field, 1);

        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(filter)
            .projection(projection)
            .await
            .map_err(|e| AdapterError::query(collection, e))?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| AdapterError::query(collection, e))?;

        Ok(docs
            .into_iter()
            .filter_map(|mut d| d.remove(field))
            .collect())
    }

    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertReport, AdapterError> {
        let attempted = docs.len();
        if attempted == 0 {
            return Ok(InsertReport::default());
        }

        let result = self
            .db
            .collection::<Document>(collection)
            .insert_many(docs)
            .ordered(false)
            .await;

        match result {
            Ok(res) => Ok(InsertReport {
                attempted,
                inserted: res.inserted_ids.len(),
                failures: Vec::new(),
            }),
            Err(err) => {
                if let ErrorKind::InsertMany(failure) = err.kind.as_ref()
                    && let Some(write_errors) = &failure.write_errors
                {
                    let failures = write_errors
                        .iter()
                        .map(|e| WriteFailure {
                            index: e.index,
                            code: e.code,
                            message: e.message.clone(),
                        })
                        .collect();
                    return Ok(InsertReport::from_failures(attempted, failures));
                }
                Err(AdapterError::Write {
                    collection: collection.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    async fn ensure_index(&self, collection: &str, field: &str) -> Result<(), AdapterError> {
        let mut keys = Document::new();
        keys.insert(field, -1);
        let model = IndexModel::builder().keys(keys).build();

        let created = self
            .db
            .collection::<Document>(collection)
            .create_index(model)
            .await
            .map_err(|e| AdapterError::query(collection, e))?;
        info!(collection, index = %created.index_name, "Index ensured");
        Ok(())
    }
}
