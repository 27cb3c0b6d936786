use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock file I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode lock marker: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("State store unavailable: {0}")]
    Open(#[source] sled::Error),

    #[error("Failed to append journal entry: {0}")]
    Append(String),

    #[error("Failed to read journal entries: {0}")]
    Read(String),
}
