use crate::error::RunError;
use connectors::{adapter::Adapter, error::AdapterError};
use engine_config::settings::{DestinationEndpoint, PipelineSettings, Settings, SourceEndpoint};
use engine_core::connectors::{destination::Destination, source::Source};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Open adapters keyed by connection name. Pipelines sharing a connection
/// share its client.
#[derive(Clone, Default)]
pub struct Connections {
    adapters: BTreeMap<String, Adapter>,
}

/// Connection names used by `pipelines`, in name order.
pub fn connection_names<'a>(pipelines: impl IntoIterator<Item = &'a PipelineSettings>) -> BTreeSet<String> {
    pipelines
        .into_iter()
        .flat_map(|p| [p.source.connection.clone(), p.destination.connection.clone()])
        .collect()
}

impl Connections {
    pub async fn open(settings: &Settings, names: &BTreeSet<String>) -> Result<Self, RunError> {
        let mut connections = Connections::default();
        for name in names {
            let Some(conn) = settings.connection(name) else {
                connections.close().await;
                return Err(RunError::UnknownConnection(name.clone()));
            };
            match Adapter::connect(&conn.uri, conn.timeout()).await {
                Ok(adapter) => {
                    info!(connection = %name, "Connection opened");
                    connections.adapters.insert(name.clone(), adapter);
                }
                Err(e) => {
                    connections.close().await;
                    return Err(e.into());
                }
            }
        }
        Ok(connections)
    }

    pub fn with_adapter(mut self, name: impl Into<String>, adapter: Adapter) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Adapter, RunError> {
        self.adapters
            .get(name)
            .ok_or_else(|| RunError::UnknownConnection(name.to_string()))
    }

    pub fn source(&self, endpoint: &SourceEndpoint) -> Result<Source, RunError> {
        let adapter = self.get(&endpoint.connection)?;
        Ok(Source::new(
            format!("{}/{}", endpoint.connection, endpoint.database),
            adapter.source(&endpoint.database),
        ))
    }

    pub fn destination(&self, endpoint: &DestinationEndpoint) -> Result<Destination, RunError> {
        let adapter = self.get(&endpoint.connection)?;
        Ok(Destination::new(
            format!("{}/{}", endpoint.connection, endpoint.database),
            adapter.destination(&endpoint.database),
        ))
    }

    /// Round trip to every connection.
    pub async fn ping_all(&self) -> Vec<(String, Result<(), AdapterError>)> {
        let mut results = Vec::with_capacity(self.adapters.len());
        for (name, adapter) in &self.adapters {
            let result = adapter.ping().await;
            if let Err(e) = &result {
                warn!(connection = %name, error = %e, "Ping failed");
            }
            results.push((name.clone(), result));
        }
        results
    }

    pub async fn close(&self) {
        for adapter in self.adapters.values() {
            adapter.close().await;
        }
    }
}
