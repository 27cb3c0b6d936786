use crate::{
    error::RunError,
    execution::{
        coordinator::{Clock, RunCoordinator, RunOutcome, RunParams, system_clock},
        factory::{Connections, connection_names},
    },
};
use connectors::error::AdapterError;
use engine_config::settings::{PipelineSettings, Settings};
use model::core::provenance::PROCESSING_TIME;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of one pipeline within an invocation.
#[derive(Debug)]
pub struct PipelineRun {
    pub pipeline: String,
    pub result: Result<RunOutcome, RunError>,
}

/// Runs `only` (or every configured pipeline) one after another, then
/// closes the connections.
pub async fn run(
    settings: Settings,
    only: Option<&str>,
    cancel: CancellationToken,
) -> Result<Vec<PipelineRun>, RunError> {
    let executor = Executor::connect(settings, only, cancel).await?;
    let runs = executor.run(only).await;
    executor.close().await;
    runs
}

pub struct Executor {
    settings: Settings,
    connections: Connections,
    clock: Clock,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(settings: Settings, connections: Connections, cancel: CancellationToken) -> Self {
        Self {
            settings,
            connections,
            clock: system_clock(),
            cancel,
        }
    }

    /// Opens the connections the selected pipelines need.
    pub async fn connect(
        settings: Settings,
        only: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Self, RunError> {
        let names = connection_names(select(&settings, only)?);
        let connections = Connections::open(&settings, &names).await?;
        Ok(Self::new(settings, connections, cancel))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn coordinator(&self, pipeline: &PipelineSettings) -> Result<RunCoordinator, RunError> {
        Ok(RunCoordinator::new(RunParams {
            pipeline: pipeline.clone(),
            source: self.connections.source(&pipeline.source)?,
            destination: self.connections.destination(&pipeline.destination)?,
            chunk_size: pipeline.chunk_size(&self.settings.run),
            default_lookback: pipeline.lookback(&self.settings.run),
            timezone: self.settings.timezone()?,
            lock_dir: self.settings.lock_dir(),
            journal_dir: self.settings.journal_dir(&pipeline.name),
            clock: self.clock.clone(),
            cancel: self.cancel.clone(),
        }))
    }

    pub async fn run(&self, only: Option<&str>) -> Result<Vec<PipelineRun>, RunError> {
        let pipelines = select(&self.settings, only)?;
        let total = pipelines.len();
        let mut runs = Vec::with_capacity(total);

        for (idx, pipeline) in pipelines.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    "Shutdown requested before starting pipeline {}/{}: {}",
                    idx + 1,
                    total,
                    pipeline.name
                );
                break;
            }

            info!("Running pipeline {}/{}: {}", idx + 1, total, pipeline.name);
            let result = match self.coordinator(pipeline) {
                Ok(coordinator) => coordinator.run().await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                error!(pipeline = %pipeline.name, error = %e, "Pipeline failed");
            }
            runs.push(PipelineRun {
                pipeline: pipeline.name.clone(),
                result,
            });
        }

        Ok(runs)
    }

    pub async fn ping(&self) -> Vec<(String, Result<(), AdapterError>)> {
        self.connections.ping_all().await
    }

    /// Creates the descending `Processing_Time` index on each destination
    /// and quarantine collection. Returns the collections indexed.
    pub async fn ensure_indexes(&self, only: Option<&str>) -> Result<Vec<String>, RunError> {
        let mut indexed = Vec::new();
        for pipeline in select(&self.settings, only)? {
            let destination = self.connections.destination(&pipeline.destination)?;
            for collection in [
                pipeline.destination.collection.clone(),
                pipeline.quarantine_collection(),
            ] {
                destination.ensure_index(&collection, PROCESSING_TIME).await?;
                info!(pipeline = %pipeline.name, collection = %collection, "Index ensured");
                indexed.push(collection);
            }
        }
        Ok(indexed)
    }

    pub async fn close(&self) {
        self.connections.close().await;
    }
}

fn select<'a>(settings: &'a Settings, only: Option<&str>) -> Result<Vec<&'a PipelineSettings>, RunError> {
    match only {
        Some(name) => settings
            .pipeline(name)
            .map(|p| vec![p])
            .ok_or_else(|| RunError::UnknownPipeline(name.to_string())),
        None => Ok(settings.pipelines.iter().collect()),
    }
}
