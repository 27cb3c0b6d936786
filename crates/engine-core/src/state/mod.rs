use crate::{error::StateStoreError, state::models::JournalEntry};
use async_trait::async_trait;

pub mod models;
pub mod sled_store;

/// Append-only run journal.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn append(&self, entry: &JournalEntry) -> Result<(), StateStoreError>;

    /// Entries of one pipeline in append order.
    async fn entries(&self, pipeline: &str) -> Result<Vec<JournalEntry>, StateStoreError>;
}
