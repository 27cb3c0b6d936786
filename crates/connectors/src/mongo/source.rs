use crate::{
    base::{requests::FetchRequest, source::DocumentSource},
    error::AdapterError,
    mongo::{adapter::MongoAdapter, query},
};
use async_trait::async_trait;
use bson::Document;
use futures_util::TryStreamExt;
use model::pagination::window::WindowPredicate;
use mongodb::Database;
use tracing::debug;

pub struct MongoSource {
    db: Database,
}

impl MongoSource {
    pub fn new(adapter: &MongoAdapter, database: &str) -> Self {
        MongoSource {
            db: adapter.database(database),
        }
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    async fn collection_names(&self) -> Result<Vec<String>, AdapterError> {
        Ok(self.db.list_collection_names().await?)
    }

    async fn count(
        &self,
        collection: &str,
        predicate: &WindowPredicate,
    ) -> Result<u64, AdapterError> {
        self.db
            .collection::<Document>(collection)
            .count_documents(query::window_filter(predicate))
            .await
            .map_err(|e| AdapterError::query(collection, e))
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Document>, AdapterError> {
        let filter = query::fetch_filter(&request.predicate, &request.after);
        debug!(collection = %request.collection, filter = %filter, limit = request.limit, "Fetching page");

        let coll = self.db.collection::<Document>(&request.collection);
        let mut find = coll
            .find(filter)
            .sort(query::sort_spec(&request.predicate))
            .limit(request.limit as i64);
        if let Some(fields) = &request.projection {
            find = find.projection(query::projection(fields));
        }

        let cursor = find
            .await
            .map_err(|e| AdapterError::query(&request.collection, e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| AdapterError::query(&request.collection, e))
    }
}
