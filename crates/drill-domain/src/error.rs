//! Error types for the `drill-domain` crate.
//!
//! Loading a domain either yields a complete, validated [`DomainIndex`] or a
//! [`DomainError`]; there is no partially built index.
//!
//! [`DomainIndex`]: crate::index::DomainIndex

use drill_types::{
    Difficulty, ImplementationId, ObjectDescId, SchemaId, ServiceId, SettingId, TaskDescId,
};

/// Errors that can occur while loading, building or querying a domain.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Failed to read a domain document from disk.
    #[error("failed to read domain file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse a domain document.
    #[error("failed to parse domain YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Two concepts of the same kind share an id.
    #[error("duplicate {kind} id: {id}")]
    DuplicateId {
        /// Concept kind (`service`, `object`, ...).
        kind: &'static str,
        /// The repeated id.
        id: String,
    },

    /// A concept refers to an id that does not exist.
    #[error("{kind} {id} references unknown {target} {reference}")]
    DanglingReference {
        /// Kind of the referring concept.
        kind: &'static str,
        /// Id of the referring concept.
        id: String,
        /// Kind of the referenced concept.
        target: &'static str,
        /// The unknown id.
        reference: String,
    },

    /// An implementation lists a different number of actors than actions.
    #[error("implementation {id} has {actions} actions but {actors} actors")]
    ActorArity {
        /// The offending implementation.
        id: ImplementationId,
        /// Number of precondition actions.
        actions: usize,
        /// Number of actor requirements.
        actors: usize,
    },

    /// A difficulty range with `min > max`.
    #[error("{kind} {id} has inverted difficulty range [{min}, {max}]")]
    InvertedDifficulty {
        /// Kind of the concept (`schema` or `implementation`).
        kind: &'static str,
        /// Id of the concept.
        id: String,
        /// Declared lower bound.
        min: Difficulty,
        /// Declared upper bound.
        max: Difficulty,
    },

    /// An object entry whose fields contradict its declared kind.
    #[error("object {id} is invalid: {reason}")]
    InvalidObject {
        /// The offending object description.
        id: ObjectDescId,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An implementation is offered by one object but declares another.
    #[error("implementation {id} is offered by {offered_by} but belongs to {owner}")]
    ConflictingOwner {
        /// The implementation.
        id: ImplementationId,
        /// Object listing the implementation in its offers.
        offered_by: ObjectDescId,
        /// Object named by the implementation itself.
        owner: ObjectDescId,
    },

    /// A schema is listed as a decomposition of a task it does not decompose.
    #[error("schema {id} decomposes {task} but is listed under {listed_under}")]
    ConflictingSchemaTask {
        /// The schema.
        id: SchemaId,
        /// Task named by the schema.
        task: TaskDescId,
        /// Task listing the schema.
        listed_under: TaskDescId,
    },

    /// Lookup of an unknown service.
    #[error("service not found: {0}")]
    ServiceNotFound(ServiceId),

    /// Lookup of an unknown object description.
    #[error("object description not found: {0}")]
    ObjectNotFound(ObjectDescId),

    /// Lookup of an unknown task description.
    #[error("task description not found: {0}")]
    TaskNotFound(TaskDescId),

    /// Lookup of an unknown decomposition schema.
    #[error("decomposition schema not found: {0}")]
    SchemaNotFound(SchemaId),

    /// Lookup of an unknown service implementation.
    #[error("service implementation not found: {0}")]
    ImplementationNotFound(ImplementationId),

    /// Lookup of an unknown setting.
    #[error("setting not found: {0}")]
    SettingNotFound(SettingId),
}

impl From<serde_yml::Error> for DomainError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}
