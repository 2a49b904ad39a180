use crate::render::OutputMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    /// Absent means run until interrupted.
    #[serde(default)]
    pub iterations: Option<u64>,
    #[serde(default = "default_sample_timeout_ms")]
    pub sample_timeout_ms: u64,
    #[serde(default)]
    pub output: OutputMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            iterations: None,
            sample_timeout_ms: default_sample_timeout_ms(),
            output: OutputMode::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }

    /// Parses without validating; CLI overrides are applied before
    /// [`Config::validate`] runs.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match Duration::try_from_secs_f64(self.interval_secs) {
            Ok(interval) if !interval.is_zero() => {}
            _ => {
                return Err(ConfigError::Validation(
                    "interval_secs must be a finite number of seconds, at least 1ns".to_string(),
                ));
            }
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::Validation(
                "iterations must be >= 1 when set".to_string(),
            ));
        }
        if self.sample_timeout_ms < 1 {
            return Err(ConfigError::Validation(
                "sample_timeout_ms must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Panics on an `interval_secs` that [`Config::validate`] rejects.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

const fn default_interval_secs() -> f64 {
    1.0
}

const fn default_sample_timeout_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = Config::from_yaml_str("{}").expect("empty mapping parses");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.interval(), Duration::from_secs(1));
        assert_eq!(cfg.iterations, None);
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = Config::from_yaml_str(Config::example_yaml()).expect("example parses");
        cfg.validate().expect("example validates");
    }

    #[test]
    fn parses_all_fields() {
        let cfg = Config::from_yaml_str(
            "interval_secs: 0.25\niterations: 100\nsample_timeout_ms: 500\noutput: json\n",
        )
        .unwrap();
        assert_eq!(cfg.interval(), Duration::from_millis(250));
        assert_eq!(cfg.iterations, Some(100));
        assert_eq!(cfg.sample_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.output, OutputMode::Json);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            Config {
                interval_secs: 0.0,
                ..Config::default()
            },
            Config {
                interval_secs: f64::INFINITY,
                ..Config::default()
            },
            Config {
                interval_secs: -1.0,
                ..Config::default()
            },
            Config {
                interval_secs: 1e-10,
                ..Config::default()
            },
            Config {
                iterations: Some(0),
                ..Config::default()
            },
            Config {
                sample_timeout_ms: 0,
                ..Config::default()
            },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(ConfigError::Validation(_))),
                "{cfg:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load_from_file("/nonexistent/resmon.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
