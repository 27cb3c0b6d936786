use crate::{error::CliError, shutdown::ExitCode};
use chrono::{DateTime, Utc};
use engine_core::progress::RunSummary;
use engine_runtime::execution::{coordinator::RunOutcome, executor::PipelineRun};

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

/// One line per pipeline run.
pub fn run_lines(runs: &[PipelineRun]) -> Vec<String> {
    runs.iter()
        .map(|run| match &run.result {
            Ok(RunOutcome::Completed(report)) => {
                let overall = report.totals.overall();
                format!(
                    "{:<20} completed  extracted={} processed={} quarantined={} skipped={} failed_collections={} ({:.2}s)",
                    run.pipeline,
                    overall.extracted,
                    overall.processed,
                    overall.quarantined,
                    overall.skipped_duplicates,
                    report.totals.failed_collections.len(),
                    report.duration.as_secs_f64()
                )
            }
            Ok(RunOutcome::Skipped { holder, .. }) => format!(
                "{:<20} skipped    lock held by run {}",
                run.pipeline,
                holder
                    .as_ref()
                    .map(|h| h.run_id.as_str())
                    .unwrap_or("unknown")
            ),
            Ok(RunOutcome::Aborted { reason, .. }) => {
                format!("{:<20} aborted    {reason}", run.pipeline)
            }
            Err(e) => format!("{:<20} failed     {e}", run.pipeline),
        })
        .collect()
}

pub fn print_runs(runs: &[PipelineRun]) {
    for line in run_lines(runs) {
        println!("{line}");
    }
}

/// Non-zero when any pipeline did not complete cleanly. A held lock is not
/// a failure.
pub fn exit_code(runs: &[PipelineRun], shutdown_requested: bool) -> ExitCode {
    if shutdown_requested {
        return ExitCode::ShutdownRequested;
    }
    let clean = runs.iter().all(|run| match &run.result {
        Ok(RunOutcome::Completed(report)) => !report.totals.has_failures(),
        Ok(RunOutcome::Skipped { .. }) => true,
        Ok(RunOutcome::Aborted { .. }) | Err(_) => false,
    });
    if clean {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

pub fn history_lines(pipeline: &str, runs: &[RunSummary]) -> Vec<String> {
    let mut lines = vec![
        format!("Runs of pipeline '{pipeline}':"),
        format!(
            "{:<38} {:<11} {:<20} {:<20} {:>10} {:>10}",
            "Run", "Status", "Window start", "Window end", "Processed", "Quarantined"
        ),
    ];
    for run in runs {
        let overall = run.totals.as_ref().map(|t| t.overall());
        let mut line = format!(
            "{:<38} {:<11} {:<20} {:<20} {:>10} {:>10}",
            run.run_id,
            run.status.to_string(),
            timestamp(run.window_start),
            timestamp(run.window_end),
            overall.map(|t| t.processed.to_string()).unwrap_or_default(),
            overall.map(|t| t.quarantined.to_string()).unwrap_or_default(),
        );
        if let Some(reason) = &run.reason {
            line.push_str(&format!("  {reason}"));
        }
        lines.push(line);
    }
    lines
}

pub fn print_history(pipeline: &str, runs: &[RunSummary], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json = serde_json::to_string_pretty(runs)?;
        println!("{json}");
    } else {
        for line in history_lines(pipeline, runs) {
            println!("{line}");
        }
    }
    Ok(())
}
