use crate::{error::ConfigError, settings::Settings};
use std::{collections::HashMap, fs, path::Path, path::PathBuf};

const PREFIX: &str = "TIDEMARK_";

/// Environment variables consulted for configuration overrides.
///
/// Recognized keys:
/// - `TIDEMARK_<CONNECTION>_URI`: connection URI, name uppercased with `-` as `_`
/// - `TIDEMARK_CHUNK_SIZE`, `TIDEMARK_LOOKBACK_SECS`
/// - `TIDEMARK_TIMEZONE`, `TIDEMARK_STATE_DIR`, `TIDEMARK_LOG_LEVEL`
#[derive(Debug, Clone, Default)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    /// Snapshot of the process environment.
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load `KEY=VALUE` lines from a .env file. File values win over the
    /// process environment.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.parse_env_content(&content)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::EnvFile(format!(
                    "malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };
            let key = key.trim().trim_start_matches("export ").trim();
            if key.is_empty() {
                return Err(ConfigError::EnvFile(format!(
                    "empty key at line {}",
                    line_num + 1
                )));
            }
            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
        }
        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }
        value.to_string()
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| ConfigError::Env {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    pub fn connection_key(name: &str) -> String {
        format!("{PREFIX}{}_URI", name.to_uppercase().replace('-', "_"))
    }

    /// Applies every recognized override and returns the keys used.
    pub fn apply(&self, settings: &mut Settings) -> Result<Vec<String>, ConfigError> {
        let mut applied = Vec::new();

        for (name, conn) in settings.connections.iter_mut() {
            let key = Self::connection_key(name);
            if let Some(uri) = self.get(&key) {
                conn.uri = uri.to_string();
                applied.push(key);
            }
        }

        let key = format!("{PREFIX}CHUNK_SIZE");
        if let Some(size) = self.parse::<usize>(&key)? {
            settings.run.chunk_size = size;
            applied.push(key);
        }

        let key = format!("{PREFIX}LOOKBACK_SECS");
        if let Some(secs) = self.parse::<u64>(&key)? {
            settings.run.default_lookback_secs = secs;
            applied.push(key);
        }

        let key = format!("{PREFIX}TIMEZONE");
        if let Some(tz) = self.get(&key) {
            settings.run.display_timezone = tz.to_string();
            applied.push(key);
        }

        let key = format!("{PREFIX}STATE_DIR");
        if let Some(dir) = self.get(&key) {
            settings.run.state_dir = Some(PathBuf::from(dir));
            applied.push(key);
        }

        let key = format!("{PREFIX}LOG_LEVEL");
        if let Some(level) = self.get(&key) {
            settings.logging.level = level.to_string();
            applied.push(key);
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ConnectionSettings;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.connections.insert(
            "source-logs".into(),
            ConnectionSettings {
                uri: "mongodb://old".into(),
                server_selection_timeout_secs: None,
            },
        );
        settings
    }

    #[test]
    fn overrides_connection_uri_and_run_settings() {
        let env = EnvManager::from_pairs([
            ("TIDEMARK_SOURCE_LOGS_URI", "mongodb://new:27017/"),
            ("TIDEMARK_LOOKBACK_SECS", "1200"),
            ("UNRELATED", "x"),
        ]);
        let mut settings = settings();
        let applied = env.apply(&mut settings).unwrap();

        assert_eq!(settings.connections["source-logs"].uri, "mongodb://new:27017/");
        assert_eq!(settings.run.default_lookback_secs, 1200);
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn rejects_non_numeric_chunk_size() {
        let env = EnvManager::from_pairs([("TIDEMARK_CHUNK_SIZE", "lots")]);
        let err = env.apply(&mut settings()).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "TIDEMARK_CHUNK_SIZE"));
    }

    #[test]
    fn parses_env_file_content() {
        let mut env = EnvManager::default();
        env.parse_env_content(
            "# comment\nexport TIDEMARK_TIMEZONE=\"UTC\"\nTIDEMARK_LOG_LEVEL='debug'\n",
        )
        .unwrap();
        assert_eq!(env.get("TIDEMARK_TIMEZONE"), Some("UTC"));
        assert_eq!(env.get("TIDEMARK_LOG_LEVEL"), Some("debug"));

        assert!(env.parse_env_content("NOEQUALS").is_err());
    }
}
