use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid display timezone: {0}")]
    Timezone(String),

    #[error("Invalid value for {key}: {value}")]
    Env { key: String, value: String },

    #[error("Invalid env file: {0}")]
    EnvFile(String),

    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}
