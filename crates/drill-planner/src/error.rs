//! Error types for the `drill-planner` crate.
//!
//! [`PlanError`] classifies why one decomposition or resolution step failed.
//! Most are recovered locally by trying the next ranked candidate; they only
//! surface when every alternative at a decision point is exhausted.
//! [`GenerateError`] is what a scenario request finally fails with.

use drill_domain::DomainError;
use drill_types::{
    AgentType, ImplementationId, ObjectDescId, SchemaId, ServiceId, TaskDescId, TaskInstanceId,
};

/// Errors that can occur while planning a scenario.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The domain index rejected a lookup.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// No candidate implementation could offer the service.
    #[error("service {service} cannot be offered")]
    UnresolvableService {
        /// The service requested.
        service: ServiceId,
    },

    /// Every present instance of the serving description carries a
    /// conflicting implementation.
    #[error("no present instance can take implementation {implementation} without conflict")]
    ConstraintsUnsatisfied {
        /// The implementation that conflicts.
        implementation: ImplementationId,
    },

    /// A composite decomposition was requested for a task without schemas.
    #[error("task {task} has no decomposition schemas")]
    NoDecomposition {
        /// The task.
        task: TaskDescId,
    },

    /// No schema of the task qualified under the policy, or every
    /// qualifying schema failed to expand.
    #[error("no applicable decomposition schema for task {task}")]
    NoApplicableSchema {
        /// The task.
        task: TaskDescId,
    },

    /// A forced schema does not decompose the task it was applied to.
    #[error("schema {schema} cannot decompose task {task}")]
    SchemaMismatch {
        /// The forced schema.
        schema: SchemaId,
        /// The task it was applied to.
        task: TaskDescId,
    },

    /// An implementation needs an actor type no agent description has.
    #[error("no agent description of type {agent_type}")]
    NoAgentOfType {
        /// The required agent type.
        agent_type: AgentType,
    },

    /// A type description has no concrete description below it.
    #[error("object description {object} has no concrete specialisation")]
    NoConcreteDescription {
        /// The type description.
        object: ObjectDescId,
    },

    /// The task instance to decompose is not in the planning sequence.
    #[error("task instance {task} is not in the planning sequence")]
    TaskNotPlanned {
        /// The missing task instance.
        task: TaskInstanceId,
    },
}

/// Errors that can occur while generating a scenario for a request.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The requested template does not exist.
    #[error("unknown scenario template: {0}")]
    UnknownTemplate(String),

    /// The requested target task does not exist.
    #[error("unknown target task: {0}")]
    UnknownTask(String),

    /// The requested setting does not exist.
    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    /// No schema chain connects a template task to the target.
    #[error("task {target} cannot be fitted into template {template}")]
    CriticalPathNotFound {
        /// Template name.
        template: String,
        /// Target task.
        target: TaskDescId,
    },

    /// Planning failed after every alternative was exhausted.
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    /// The domain index rejected a lookup.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl GenerateError {
    /// Short machine-friendly classification of the failure.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTemplate(_) => "unknown_template",
            Self::UnknownTask(_) => "unknown_task",
            Self::UnknownSetting(_) => "unknown_setting",
            Self::CriticalPathNotFound { .. } => "critical_path_not_found",
            Self::Plan(PlanError::SchemaMismatch { .. }) => "schema_mismatch",
            Self::Plan(PlanError::UnresolvableService { .. }) => "unresolvable_service",
            Self::Plan(PlanError::NoApplicableSchema { .. }) => "no_applicable_schema",
            Self::Plan(_) => "plan_failed",
            Self::Domain(_) => "domain",
        }
    }
}
