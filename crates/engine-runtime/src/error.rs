use connectors::error::AdapterError;
use engine_config::error::ConfigError;
use engine_core::error::{LockError, StateStoreError};
use engine_processing::error::{ConsumerError, ProducerError, WatermarkError};
use model::pagination::window::WindowError;
use thiserror::Error;

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Run lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Run journal error: {0}")]
    State(#[from] StateStoreError),

    #[error("Failed to resolve watermark: {0}")]
    Watermark(#[from] WatermarkError),

    #[error("Invalid run window: {0}")]
    Window(#[from] WindowError),

    #[error("Failed to list source collections: {0}")]
    ListCollections(#[source] AdapterError),

    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

/// Errors confined to one source collection. The run records them and moves
/// on to the next collection.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Consumer(#[from] ConsumerError),

    #[error("Shutdown requested")]
    Cancelled,
}
