#![allow(dead_code)]

use chrono::{DateTime, Utc};
use connectors::{adapter::Adapter, memory::{MemoryCluster, MemoryStore}};
use engine_config::settings::Settings;
use engine_runtime::execution::{
    coordinator::{Clock, RunOutcome},
    executor::Executor,
    factory::Connections,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub mod engine;
pub mod utils;

pub const SOURCE_DB: &str = "Logs";
pub const TARGET_DB: &str = "Reports";

/// Two airline collections plus one that never exists at the source.
pub const AIRLINE_PIPELINE: &str = r#"
[run]
chunk_size = 2
default_lookback_secs = 600
display_timezone = "Asia/Kolkata"

[connections.source]
uri = "memory://"

[connections.target]
uri = "memory://"

[[pipelines]]
name = "merged_api_airline"
source = { connection = "source", database = "Logs" }
collections = ["Indigo_RQ_RS", "SpiceJet_RQ_RS", "Missing_RQ_RS"]
destination = { connection = "target", database = "Reports", collection = "Merged_API_Airline" }
quarantine = "Merged_API_Airline_Issue"
window = { kind = "timestamp", field = "InsertOn" }
shape = { root = ["InsertOn", "level"], nested_key = "Message", nested = ["IsIntl", "elapsed_time"], durations = ["elapsed_time"] }
derivations = [
    { kind = "collection_label", output = "airline_name", strip_suffix = "_RQ_RS" },
    { kind = "flight_type", field = "IsIntl", output = "FlightType" },
    { kind = "issue_flag", flag = "is_issue", reason = "issue" },
]
"#;

/// Flat source windowed by a local `(date, time)` string pair.
pub const ECOM_PIPELINE: &str = r#"
[run]
chunk_size = 2
display_timezone = "Asia/Kolkata"

[connections.source]
uri = "memory://"

[connections.target]
uri = "memory://"

[[pipelines]]
name = "ecom"
source = { connection = "source", database = "Logs" }
collections = ["ECOMData"]
destination = { connection = "target", database = "Reports", collection = "NewECOMData" }
window = { kind = "date_time_pair", date_field = "inserted_date", time_field = "inserted_time" }
shape = { root = ["inserted_date", "inserted_time", "cabinClass", "travelDate", "coupon"] }
dedup_key = "_id"
derivations = [
    { kind = "category_map", field = "cabinClass", mapping = { "0" = "Economy", "4" = "Premium Economy", "2" = "Business", "1" = "First" } },
    { kind = "normalize_date", field = "travelDate" },
    { kind = "uppercase", field = "coupon", trim = true },
]
"#;

/// Settings, one in-memory cluster behind both connections, a private state
/// directory and a controllable clock.
pub struct TestEnv {
    pub settings: Settings,
    pub cluster: MemoryCluster,
    now: Arc<Mutex<DateTime<Utc>>>,
    _state_dir: TempDir,
}

impl TestEnv {
    pub fn new(config: &str, now: DateTime<Utc>) -> Self {
        let state_dir = tempfile::tempdir().expect("state dir");
        let mut settings = Settings::from_toml(config).expect("parse settings");
        settings.run.state_dir = Some(state_dir.path().to_path_buf());
        settings.validate().expect("valid settings");

        Self {
            settings,
            cluster: MemoryCluster::default(),
            now: Arc::new(Mutex::new(now)),
            _state_dir: state_dir,
        }
    }

    pub fn source(&self) -> MemoryStore {
        self.cluster.database(SOURCE_DB)
    }

    pub fn target(&self) -> MemoryStore {
        self.cluster.database(TARGET_DB)
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }

    pub fn executor(&self) -> Executor {
        self.executor_with_cancel(CancellationToken::new())
    }

    pub fn executor_with_cancel(&self, cancel: CancellationToken) -> Executor {
        let connections = Connections::default()
            .with_adapter("source", Adapter::Memory(self.cluster.clone()))
            .with_adapter("target", Adapter::Memory(self.cluster.clone()));
        Executor::new(self.settings.clone(), connections, cancel).with_clock(self.clock())
    }

    /// Runs the single configured pipeline.
    pub async fn run(&self) -> RunOutcome {
        let mut runs = self.executor().run(None).await.expect("run pipelines");
        assert_eq!(runs.len(), 1, "expected exactly one pipeline");
        runs.remove(0).result.expect("pipeline result")
    }
}
