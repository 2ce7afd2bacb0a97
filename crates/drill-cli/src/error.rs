//! Error types for the `drill` binary.
//!
//! [`CliError`] wraps every failure mode of a run so `main` can propagate
//! it with `?`. Individual scenario runs failing is not an error here; those
//! are logged and listed in the report.

/// Top-level error for the `drill` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: drill_planner::ConfigError,
    },

    /// The domain file could not be loaded or failed validation.
    #[error("domain error: {source}")]
    Domain {
        /// The underlying domain error.
        #[from]
        source: drill_domain::DomainError,
    },

    /// Writing the report failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The report template failed to compile or render.
    #[error("template error: {0}")]
    Template(String),

    /// JSON serialization of the report failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
