//! Constrained HTN planning for training scenarios.
//!
//! Given a domain, a scenario template, the task a trainee should practise,
//! a difficulty and a setting, the planner produces a scenario: the
//! trainee's sequence of atomic tasks, the story actions other agents
//! perform to set the scene and the objects present in the world. Choices
//! are ranked by difficulty and setting fit, ties are broken at random and
//! every speculative step can be rolled back.
//!
//! # Modules
//!
//! - [`config`] -- YAML run configuration ([`GeneratorConfig`])
//! - [`critical_path`] -- Schema chain from a template task to the target
//! - [`decomposer`] -- Schema selection and recursive task decomposition
//! - [`error`] -- [`PlanError`] and [`GenerateError`]
//! - [`generator`] -- Request-level [`ScenarioGenerator`]
//! - [`ranking`] -- Difficulty and setting-fit comparators
//! - [`resolver`] -- Service resolution against the scenario state
//! - [`timeline`] -- Copy-on-write scenario state

pub mod config;
pub mod critical_path;
pub mod decomposer;
pub mod error;
pub mod generator;
pub mod ranking;
pub mod resolver;
pub mod timeline;

#[cfg(test)]
mod test_support;

pub use config::{
    ConfigError, DomainConfig, GenerationConfig, GeneratorConfig, LoggingConfig, OutputConfig,
    OutputFormat,
};
pub use decomposer::{SchemaPolicy, TaskDecomposer};
pub use error::{GenerateError, PlanError};
pub use generator::{GeneratedScenario, ScenarioGenerator, ScenarioRequest};
pub use resolver::{PlanParams, ServiceBindings, ServiceResolver};
pub use timeline::{ServiceBinding, Timeline};
