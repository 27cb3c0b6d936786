use crate::{base::requests::InsertReport, error::AdapterError};
use async_trait::async_trait;
use bson::{Bson, Document};

/// Write side of a document database.
#[async_trait]
pub trait DocumentDestination: Send + Sync {
    /// Document with the greatest `field`, ignoring documents without it.
    async fn latest(&self, collection: &str, field: &str)
    -> Result<Option<Document>, AdapterError>;

    /// Subset of `values` already stored under `field` in `collection`.
    async fn existing_keys(
        &self,
        collection: &str,
        field: &str,
        values: &[Bson],
    ) -> Result<Vec<Bson>, AdapterError>;

    /// Unordered bulk insert. Per-document rejections are reported in the
    /// returned [`InsertReport`]; `Err` means nothing can be assumed written.
    async fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertReport, AdapterError>;

    /// Descending index on `field`.
    async fn ensure_index(&self, collection: &str, field: &str) -> Result<(), AdapterError>;
}
