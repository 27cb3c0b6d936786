use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Driver level failure not tied to a collection.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Failed to establish or verify a connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A read against a collection failed.
    #[error("Query on '{collection}' failed: {source}")]
    Query {
        collection: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// A write was rejected as a whole.
    #[error("Write to '{collection}' failed: {message}")]
    Write { collection: String, message: String },

    /// The connection URI uses a scheme no adapter handles.
    #[error("Unsupported connection scheme: {0}")]
    UnsupportedScheme(String),

    /// Generic adapter error.
    #[error("Adapter error: {0}")]
    Generic(String),
}

impl AdapterError {
    pub fn query(collection: &str, source: mongodb::error::Error) -> Self {
        AdapterError::Query {
            collection: collection.to_string(),
            source,
        }
    }
}
