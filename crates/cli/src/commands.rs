use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one pipeline, or every configured pipeline in order
    Run {
        #[arg(long, help = "Pipeline name; all pipelines when omitted")]
        pipeline: Option<String>,
    },
    /// Ping every connection and optionally create the watermark indexes
    Check {
        #[arg(long, help = "Pipeline name; all pipelines when omitted")]
        pipeline: Option<String>,

        #[arg(
            long,
            help = "Create the descending Processing_Time index on destination and quarantine collections"
        )]
        ensure_indexes: bool,
    },
    /// Show the run journal of a pipeline
    History {
        #[arg(long, help = "Pipeline name")]
        pipeline: String,

        #[arg(long, help = "Show only the most recent runs")]
        limit: Option<usize>,

        #[arg(
            long,
            help = "If set, prints the runs as JSON instead of a table"
        )]
        json: bool,
    },
    /// Remove a run lock left behind by a killed process
    Unlock {
        #[arg(long, help = "Pipeline name")]
        pipeline: String,
    },
}
