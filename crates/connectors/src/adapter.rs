use crate::{
    base::{destination::DocumentDestination, source::DocumentSource},
    error::AdapterError,
    memory::MemoryCluster,
    mongo::{adapter::MongoAdapter, destination::MongoDestination, source::MongoSource},
};
use std::{sync::Arc, time::Duration};

const MEMORY_SCHEME: &str = "memory://";

/// A live connection, selected by URI scheme.
#[derive(Clone)]
pub enum Adapter {
    Mongo(MongoAdapter),
    Memory(MemoryCluster),
}

impl Adapter {
    pub async fn connect(uri: &str, timeout: Option<Duration>) -> Result<Self, AdapterError> {
        if uri.starts_with(MEMORY_SCHEME) {
            return Ok(Adapter::Memory(MemoryCluster::default()));
        }
        if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
            let adapter = MongoAdapter::connect(uri, timeout).await?;
            return Ok(Adapter::Mongo(adapter));
        }
        let scheme = uri.split("://").next().unwrap_or(uri);
        Err(AdapterError::UnsupportedScheme(scheme.to_string()))
    }

    pub async fn ping(&self) -> Result<(), AdapterError> {
        match self {
            Adapter::Mongo(adapter) => adapter.ping().await,
            Adapter::Memory(_) => Ok(()),
        }
    }

    pub fn source(&self, database: &str) -> Arc<dyn DocumentSource> {
        match self {
            Adapter::Mongo(adapter) => Arc::new(MongoSource::new(adapter, database)),
            Adapter::Memory(cluster) => Arc::new(cluster.database(database)),
        }
    }

    pub fn destination(&self, database: &str) -> Arc<dyn DocumentDestination> {
        match self {
            Adapter::Mongo(adapter) => Arc::new(MongoDestination::new(adapter, database)),
            Adapter::Memory(cluster) => Arc::new(cluster.database(database)),
        }
    }

    pub async fn close(&self) {
        match self {
            Adapter::Mongo(adapter) => adapter.shutdown().await,
            Adapter::Memory(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_scheme_needs_no_server() {
        let adapter = Adapter::connect("memory://local", None).await.unwrap();
        assert!(adapter.ping().await.is_ok());
        assert!(matches!(adapter, Adapter::Memory(_)));
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let err = Adapter::connect("postgres://localhost/db", None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AdapterError::UnsupportedScheme(s) if s == "postgres"));
    }
}
