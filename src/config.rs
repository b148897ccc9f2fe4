use crate::error::GateError;
use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parse config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!("Config file {} not found, using defaults", path);
            return Ok(Config::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if !(self.tracker.max_distance > 0.0) {
            return Err(GateError::config(format!(
                "tracker.max_distance must be positive, got {}",
                self.tracker.max_distance
            )));
        }
        if self.tracker.track_history_len == 0 || self.tracker.confidence_history_len == 0 {
            return Err(GateError::config("tracker history capacities must be non-zero"));
        }
        if self.pipeline.max_pending_events == 0 {
            return Err(GateError::config("pipeline.max_pending_events must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tracker:\n  max_disappeared: 12\naudit:\n  violation_log_path: /tmp/v.jsonl").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.tracker.max_disappeared, 12);
        assert_eq!(config.tracker.max_distance, 100.0);
        assert_eq!(config.audit.violation_log_path, "/tmp/v.jsonl");
        assert!(!config.authorization.allow_all);
        assert!(config.authorization.seed_identifiers.is_empty());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/checkpoint.yaml").unwrap();
        assert_eq!(config.tracker.max_disappeared, 30);
    }

    #[test]
    fn test_rejects_non_positive_distance() {
        let mut config = Config::default();
        config.tracker.max_distance = 0.0;
        assert!(config.validate().is_err());
    }
}
