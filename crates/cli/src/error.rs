use engine_config::error::ConfigError;
use engine_core::error::{LockError, StateStoreError};
use engine_runtime::error::RunError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to run: {0}")]
    Runner(#[from] RunError),

    #[error("Run lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Failed to open run journal at {path}: {source}")]
    Journal {
        path: String,
        #[source]
        source: StateStoreError,
    },

    #[error("Failed to read run journal: {0}")]
    History(#[source] StateStoreError),

    #[error("Failed to open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),
}
