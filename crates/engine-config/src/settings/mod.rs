use crate::{env::EnvManager, error::ConfigError};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub mod pipeline;
pub mod validator;

pub use pipeline::{DestinationEndpoint, PipelineSettings, SourceEndpoint};

pub const DEFAULT_CHUNK_SIZE: usize = 50_000;
pub const DEFAULT_LOOKBACK_SECS: u64 = 600;
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

/// Top-level `tidemark.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionSettings>,
    #[serde(default)]
    pub pipelines: Vec<PipelineSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_lookback_secs")]
    pub default_lookback_secs: u64,
    #[serde(default = "default_timezone")]
    pub display_timezone: String,
    /// Lock markers and run journal. Defaults to `~/.tidemark/state`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            chunk_size: DEFAULT_CHUNK_SIZE,
            default_lookback_secs: DEFAULT_LOOKBACK_SECS,
            display_timezone: DEFAULT_TIMEZONE.to_string(),
            state_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, opened in append mode.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub uri: String,
    #[serde(default)]
    pub server_selection_timeout_secs: Option<u64>,
}

impl ConnectionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_secs.map(Duration::from_secs)
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_lookback_secs() -> u64 {
    DEFAULT_LOOKBACK_SECS
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse, apply environment overrides, validate. Returns the settings
    /// and the names of the overrides that were applied.
    pub fn load(
        path: impl AsRef<Path>,
        env: &EnvManager,
    ) -> Result<(Self, Vec<String>), ConfigError> {
        let mut settings = Self::from_file(path)?;
        let applied = env.apply(&mut settings)?;
        settings.validate()?;
        Ok((settings, applied))
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.run
            .display_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(self.run.display_timezone.clone()))
    }

    pub fn state_dir(&self) -> PathBuf {
        match &self.run.state_dir {
            Some(dir) => expand_home(dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".tidemark")
                .join("state"),
        }
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.state_dir().join("locks")
    }

    pub fn journal_dir(&self, pipeline: &str) -> PathBuf {
        self.state_dir().join("journal").join(pipeline)
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineSettings> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionSettings> {
        self.connections.get(name)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
