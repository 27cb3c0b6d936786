use crate::{base::requests::FetchRequest, error::AdapterError};
use async_trait::async_trait;
use bson::Document;
use model::pagination::window::WindowPredicate;

/// Read side of a document database.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn collection_names(&self) -> Result<Vec<String>, AdapterError>;

    async fn count(
        &self,
        collection: &str,
        predicate: &WindowPredicate,
    ) -> Result<u64, AdapterError>;

    /// One page in keyset order, strictly after `request.after`.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Document>, AdapterError>;
}
