use crate::{error::ConfigError, settings::Settings};
use model::{pagination::window::WindowSpec, transform::derivation::Derivation};
use std::collections::HashSet;

impl Settings {
    /// Checks the whole file and reports every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if self.pipelines.is_empty() {
            issues.push("at least one [[pipelines]] entry is required".to_string());
        }
        if self.run.chunk_size == 0 {
            issues.push("run.chunk_size must be greater than zero".to_string());
        }
        if self.timezone().is_err() {
            issues.push(format!(
                "run.display_timezone '{}' is not a known timezone",
                self.run.display_timezone
            ));
        }
        for (name, conn) in &self.connections {
            if conn.uri.trim().is_empty() {
                issues.push(format!("connections.{name}.uri is empty"));
            }
        }

        let mut names = HashSet::new();
        for pipeline in &self.pipelines {
            let name = pipeline.name.as_str();
            if name.is_empty() {
                issues.push("pipeline name must not be empty".to_string());
            } else if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                issues.push(format!(
                    "pipeline '{name}': name may only contain letters, digits, '_' and '-'"
                ));
            }
            if !names.insert(name) {
                issues.push(format!("pipeline '{name}' is defined more than once"));
            }

            for conn in [
                &pipeline.source.connection,
                &pipeline.destination.connection,
            ] {
                if !self.connections.contains_key(conn) {
                    issues.push(format!("pipeline '{name}': unknown connection '{conn}'"));
                }
            }
            if pipeline.collections.is_empty() {
                issues.push(format!("pipeline '{name}': collections must not be empty"));
            }
            if pipeline.destination.collection.is_empty() {
                issues.push(format!("pipeline '{name}': destination.collection is empty"));
            }
            if pipeline.quarantine_collection() == pipeline.destination.collection {
                issues.push(format!(
                    "pipeline '{name}': quarantine must differ from the destination collection"
                ));
            }
            if pipeline.chunk_size == Some(0) {
                issues.push(format!("pipeline '{name}': chunk_size must be greater than zero"));
            }
            if matches!(pipeline.window, WindowSpec::DateTimePair { .. })
                && pipeline.dedup_key.is_none()
            {
                issues.push(format!(
                    "pipeline '{name}': date/time pair windows require dedup_key"
                ));
            }
            for derivation in &pipeline.derivations {
                if let Derivation::Portal { rules, .. } = derivation
                    && rules.is_empty()
                {
                    issues.push(format!("pipeline '{name}': portal derivation has no rules"));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }
}
