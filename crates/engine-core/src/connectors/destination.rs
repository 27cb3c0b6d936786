use bson::{Bson, Document};
use connectors::{
    base::{destination::DocumentDestination, requests::InsertReport},
    error::AdapterError,
};
use std::sync::Arc;

/// One database on a destination connection.
#[derive(Clone)]
pub struct Destination {
    pub name: String,
    data_dest: Arc<dyn DocumentDestination>,
}

impl Destination {
    pub fn new(name: impl Into<String>, data_dest: Arc<dyn DocumentDestination>) -> Self {
        Destination {
            name: name.into(),
            data_dest,
        }
    }

    pub async fn latest(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<Document>, AdapterError> {
        self.data_dest.latest(collection, field).await
    }

    pub async fn existing_keys(
        &self,
        collection: &str,
        field: &str,
        values: &[Bson],
    ) -> Result<Vec<Bson>, AdapterError> {
        self.data_dest.existing_keys(collection, field, values).await
    }

    pub async fn write_batch(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertReport, AdapterError> {
        self.data_dest.insert_many(collection, docs).await
    }

    pub async fn ensure_index(&self, collection: &str, field: &str) -> Result<(), AdapterError> {
        self.data_dest.ensure_index(collection, field).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
