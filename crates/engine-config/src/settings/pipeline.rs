use crate::settings::RunSettings;
use model::{
    pagination::window::WindowSpec,
    transform::{derivation::Derivation, shape::RecordShape},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub connection: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationEndpoint {
    pub connection: String,
    pub database: String,
    pub collection: String,
}

/// One `[[pipelines]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub name: String,
    pub source: SourceEndpoint,
    pub collections: Vec<String>,
    pub destination: DestinationEndpoint,
    /// Quarantine collection in the destination database.
    #[serde(default)]
    pub quarantine: Option<String>,
    pub window: WindowSpec,
    #[serde(default)]
    pub shape: RecordShape,
    #[serde(default)]
    pub derivations: Vec<Derivation>,
    /// Field checked against the destination before loading.
    #[serde(default)]
    pub dedup_key: Option<String>,
    /// Restrict source reads to the shape's fields.
    #[serde(default)]
    pub project: bool,
    /// Field carrying the failure reason on quarantined records.
    #[serde(default = "default_reason_field")]
    pub reason_field: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub default_lookback_secs: Option<u64>,
}

fn default_reason_field() -> String {
    "issue".to_string()
}

impl PipelineSettings {
    pub fn quarantine_collection(&self) -> String {
        self.quarantine
            .clone()
            .unwrap_or_else(|| format!("{}_Issue", self.destination.collection))
    }

    pub fn chunk_size(&self, run: &RunSettings) -> usize {
        self.chunk_size.unwrap_or(run.chunk_size)
    }

    pub fn lookback(&self, run: &RunSettings) -> Duration {
        Duration::from_secs(
            self.default_lookback_secs
                .unwrap_or(run.default_lookback_secs),
        )
    }

    /// Source fields to request when projection is enabled.
    pub fn projection(&self) -> Option<Vec<String>> {
        if !self.project {
            return None;
        }
        let mut extra = self.window.fields();
        if let Some(key) = &self.dedup_key {
            extra.push(key.as_str());
        }
        Some(self.shape.source_fields(&extra))
    }
}
