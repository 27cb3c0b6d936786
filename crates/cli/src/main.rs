use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use engine_config::{env::EnvManager, settings::Settings};
use engine_core::{lock::RunLock, progress::HistoryService, state::sled_store::SledStateStore};
use engine_runtime::execution::executor::{self, Executor};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod commands;
mod error;
mod logging;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "tidemark", version, about = "Incremental watermark-driven log ETL")]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "TIDEMARK_CONFIG",
        default_value = "tidemark.toml",
        help = "Config file path"
    )]
    config: PathBuf,

    #[arg(long, global = true, help = "Load environment overrides from this file")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(cli: Cli) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }
    let (settings, overrides) = Settings::load(&cli.config, &env)?;
    logging::init(&settings.logging)?;

    info!(config = %cli.config.display(), "Configuration loaded");
    if !overrides.is_empty() {
        info!(overrides = ?overrides, "Environment overrides applied");
    }

    match cli.command {
        Commands::Run { pipeline } => run(settings, pipeline.as_deref()).await,
        Commands::Check {
            pipeline,
            ensure_indexes,
        } => check(settings, pipeline.as_deref(), ensure_indexes).await,
        Commands::History {
            pipeline,
            limit,
            json,
        } => {
            show_history(&settings, &pipeline, limit, json).await?;
            Ok(ExitCode::Success)
        }
        Commands::Unlock { pipeline } => {
            unlock(&settings, &pipeline)?;
            Ok(ExitCode::Success)
        }
    }
}

async fn run(settings: Settings, pipeline: Option<&str>) -> Result<ExitCode, CliError> {
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let runs = executor::run(settings, pipeline, shutdown.cancel_token()).await?;
    output::print_runs(&runs);

    let code = output::exit_code(&runs, shutdown.is_shutdown_requested());
    if let Some(signal) = shutdown.received() {
        warn!(%signal, "Stopped by shutdown request");
    }
    Ok(code)
}

async fn check(
    settings: Settings,
    pipeline: Option<&str>,
    ensure_indexes: bool,
) -> Result<ExitCode, CliError> {
    let executor = Executor::connect(settings, pipeline, CancellationToken::new()).await?;

    let mut healthy = true;
    for (name, result) in executor.ping().await {
        match result {
            Ok(()) => println!("{name:<20} ok"),
            Err(e) => {
                healthy = false;
                println!("{name:<20} unreachable: {e}");
            }
        }
    }

    if healthy && ensure_indexes {
        match executor.ensure_indexes(pipeline).await {
            Ok(indexed) => {
                for collection in indexed {
                    println!("index ensured on {collection}");
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to ensure indexes");
                healthy = false;
            }
        }
    }

    executor.close().await;
    Ok(if healthy {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    })
}

async fn show_history(
    settings: &Settings,
    pipeline: &str,
    limit: Option<usize>,
    as_json: bool,
) -> Result<(), CliError> {
    if settings.pipeline(pipeline).is_none() {
        return Err(CliError::UnknownPipeline(pipeline.to_string()));
    }

    let path = settings.journal_dir(pipeline);
    let store = SledStateStore::open(&path).map_err(|source| CliError::Journal {
        path: path.display().to_string(),
        source,
    })?;
    let service = HistoryService::new(Arc::new(store));

    let mut runs = service.runs(pipeline).await.map_err(CliError::History)?;
    if let Some(limit) = limit {
        let skip = runs.len().saturating_sub(limit);
        runs.drain(..skip);
    }
    output::print_history(pipeline, &runs, as_json)
}

fn unlock(settings: &Settings, pipeline: &str) -> Result<(), CliError> {
    if settings.pipeline(pipeline).is_none() {
        return Err(CliError::UnknownPipeline(pipeline.to_string()));
    }

    let lock = RunLock::new(settings.lock_dir(), pipeline);
    if let Some(holder) = lock.holder()? {
        info!(
            pipeline,
            run_id = %holder.run_id,
            pid = holder.pid,
            acquired_at = %holder.acquired_at,
            "Removing run lock"
        );
    }
    if lock.force_release()? {
        println!("Lock for '{pipeline}' removed");
    } else {
        println!("No lock held for '{pipeline}'");
    }
    Ok(())
}
