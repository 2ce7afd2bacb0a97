//! `drill` -- generate training scenarios from a YAML configuration.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as first argument, else
//!    `DRILL_CONFIG`, else `drill-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load and validate the domain
//! 4. Generate every configured request `runs_per_request` times
//! 5. Render the report and write it to the configured output path

mod error;
mod report;

use std::path::{Path, PathBuf};

use chrono::Utc;
use drill_domain::DomainIndex;
use drill_planner::{GeneratorConfig, LoggingConfig, ScenarioGenerator};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::report::{Report, ScenarioReport};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration or domain cannot be loaded, or
/// the report cannot be rendered or written.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let found = config_path.exists();
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    if found {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    // 3. Load the domain.
    let domain = DomainIndex::from_file(&config.domain.path).map_err(CliError::from)?;

    // 4. Generate.
    let generator = ScenarioGenerator::new(&domain);
    let scenarios: Vec<_> = config
        .requests
        .iter()
        .map(|request| ScenarioReport::collect(&generator, request, &config.generation))
        .collect();
    let succeeded = scenarios.iter().filter(|s| s.selected.is_some()).count();
    info!(
        requests = scenarios.len(),
        succeeded,
        runs_per_request = config.generation.runs_per_request,
        "Generation finished"
    );

    // 5. Render and write the report.
    let report = Report {
        generated_at: Utc::now(),
        domain: config.domain.path.display().to_string(),
        seed: config.generation.seed,
        scenarios,
    };
    let rendered = report::render(&report, config.output.format)?;
    write_report(&config.output.path, &rendered)?;
    info!(path = %config.output.path.display(), "Report written");

    Ok(())
}

/// Configuration path from the command line or environment.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("DRILL_CONFIG"))
        .map_or_else(|| PathBuf::from("drill-config.yaml"), PathBuf::from)
}

/// Load the configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<GeneratorConfig, CliError> {
    if path.exists() {
        Ok(GeneratorConfig::from_file(path)?)
    } else {
        let mut config = GeneratorConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn write_report(path: &Path, contents: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
