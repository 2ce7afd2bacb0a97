//! Configuration loading for scenario generation runs.
//!
//! The canonical configuration lives in `drill-config.yaml` at the project
//! root. It names the domain file, the seed and number of runs, logging and
//! output options and the list of scenario requests to generate.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::generator::ScenarioRequest;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level generator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GeneratorConfig {
    /// Domain source.
    #[serde(default)]
    pub domain: DomainConfig,

    /// Seed and run count.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where and how to write the report.
    #[serde(default)]
    pub output: OutputConfig,

    /// Scenarios to generate.
    #[serde(default)]
    pub requests: Vec<ScenarioRequest>,
}

impl GeneratorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DRILL_DOMAIN` overrides `domain.path`
    /// - `DRILL_SEED` overrides `generation.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. Environment overrides are
    /// not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `DRILL_DOMAIN` and `DRILL_SEED` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRILL_DOMAIN") {
            self.domain.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DRILL_SEED") {
            match val.parse() {
                Ok(seed) => self.generation.seed = seed,
                Err(_) => warn!(value = %val, "Ignoring DRILL_SEED, not an unsigned integer"),
            }
        }
    }
}

/// Domain source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DomainConfig {
    /// Path of the YAML domain file.
    #[serde(default = "default_domain_path")]
    pub path: PathBuf,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            path: default_domain_path(),
        }
    }
}

/// Seed and run count.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationConfig {
    /// Base seed; run `n` of a request uses `seed + n`.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Generation attempts per request. One successful run is reported.
    #[serde(default = "default_runs_per_request")]
    pub runs_per_request: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            runs_per_request: default_runs_per_request(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Plain-text report.
    #[default]
    Text,
    /// JSON document.
    Json,
}

/// Report output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// File the report is written to.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_domain_path() -> PathBuf {
    PathBuf::from("domains/first_aid.yaml")
}

const fn default_seed() -> u64 {
    42
}

const fn default_runs_per_request() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("scenarios.txt")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = GeneratorConfig::parse("{}").unwrap();
        assert_eq!(config.generation.runs_per_request, 10);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.path, PathBuf::from("scenarios.txt"));
        assert!(config.requests.is_empty());
    }

    #[test]
    fn parses_requests_and_sections() {
        let yaml = r"
generation:
  runs_per_request: 3
logging:
  level: debug
  json: true
output:
  path: out/report.json
  format: json
requests:
  - { template: basic, target: Cool with water, difficulty: 2, setting: park }
  - { template: basic, target: calm_person, difficulty: 3, setting: home }
";
        let config = GeneratorConfig::parse(yaml).unwrap();
        assert_eq!(config.generation.runs_per_request, 3);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.requests.len(), 2);
        let first = config.requests.first().unwrap();
        assert_eq!(first.target, "Cool with water");
        assert_eq!(first.difficulty, 2);
    }

    #[test]
    fn parse_keeps_yaml_seed_and_domain() {
        let yaml = "domain:\n  path: domains/kitchen.yaml\ngeneration:\n  seed: 7\n";
        let config = GeneratorConfig::parse(yaml).unwrap();
        assert_eq!(config.generation.seed, 7);
        assert_eq!(config.domain.path, PathBuf::from("domains/kitchen.yaml"));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = GeneratorConfig::parse("requests: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = GeneratorConfig::from_file(Path::new("/nonexistent/drill-config.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
