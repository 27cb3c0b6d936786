use bson::Document;
use connectors::{
    base::{requests::FetchRequest, source::DocumentSource},
    error::AdapterError,
};
use model::pagination::window::WindowPredicate;
use std::sync::Arc;

/// Read side of a pipeline: one database on a source connection.
#[derive(Clone)]
pub struct Source {
    pub name: String,
    primary: Arc<dyn DocumentSource>,
}

impl Source {
    pub fn new(name: impl Into<String>, primary: Arc<dyn DocumentSource>) -> Self {
        Source {
            name: name.into(),
            primary,
        }
    }

    pub async fn collection_names(&self) -> Result<Vec<String>, AdapterError> {
        self.primary.collection_names().await
    }

    pub async fn count(
        &self,
        collection: &str,
        predicate: &WindowPredicate,
    ) -> Result<u64, AdapterError> {
        self.primary.count(collection, predicate).await
    }

    pub async fn fetch_data(&self, request: &FetchRequest) -> Result<Vec<Document>, AdapterError> {
        self.primary.fetch(request).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
