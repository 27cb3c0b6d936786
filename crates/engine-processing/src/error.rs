use connectors::error::AdapterError;
use model::pagination::cursor::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Failed to count documents in '{collection}': {source}")]
    Count {
        collection: String,
        #[source]
        source: AdapterError,
    },

    #[error("Fetch from '{collection}' failed at cursor {cursor:?}: {source}")]
    Fetch {
        collection: String,
        cursor: Cursor,
        #[source]
        source: AdapterError,
    },
}

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Failed to look up existing keys in '{collection}': {source}")]
    Lookup {
        collection: String,
        #[source]
        source: AdapterError,
    },

    #[error("Failed to write batch '{batch_id}' to '{collection}': {source}")]
    Write {
        collection: String,
        batch_id: String,
        #[source]
        source: AdapterError,
    },
}

/// Per-document failure. Never leaves the classifier: it becomes the
/// quarantine reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("missing nested object '{0}'")]
    MissingNested(String),

    #[error("malformed nested object: {0}")]
    MalformedNested(String),

    #[error("missing or invalid timestamp field '{0}'")]
    MissingTimestamp(String),

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl TransformError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        TransformError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Failed to read watermark from '{collection}': {source}")]
    Query {
        collection: String,
        #[source]
        source: AdapterError,
    },

    #[error("Field '{field}' in '{collection}' is not a datetime")]
    InvalidValue { collection: String, field: String },
}
