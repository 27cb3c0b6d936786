use crate::error::AdapterError;
use bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::time::Duration;
use tracing::{debug, info};

const APP_NAME: &str = "tidemark";
const DEFAULT_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct MongoAdapter {
    client: Client,
}

impl MongoAdapter {
    pub async fn connect(uri: &str, timeout: Option<Duration>) -> Result<Self, AdapterError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| AdapterError::Connection(format!("invalid URI: {e}")))?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(timeout.unwrap_or(DEFAULT_SELECTION_TIMEOUT));

        let client = Client::with_options(options)?;
        debug!("MongoDB client created");
        Ok(MongoAdapter { client })
    }

    /// Round trip to the server; the driver connects lazily.
    pub async fn ping(&self) -> Result<(), AdapterError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;
        Ok(())
    }

    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    pub async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}
