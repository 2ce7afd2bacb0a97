//! Shared type definitions for the Drill scenario generator.
//!
//! Every crate in the workspace speaks in terms of these types: stable ids
//! for domain concepts, the concepts themselves, the scenario-local instances
//! created during generation and the difficulty/setting-fit values used to
//! rank candidates.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for concept keys and instance counters
//! - [`difficulty`] -- Difficulty ranges and setting-fit scores
//! - [`concepts`] -- Immutable domain concepts (services, objects, tasks, schemas)
//! - [`instances`] -- Task and object instances plus the id allocator

pub mod concepts;
pub mod difficulty;
pub mod ids;
pub mod instances;

// Re-export all public types at crate root for convenience.
pub use concepts::{
    ActorRequirement, Concept, DecompositionSchema, DescriptionShape, ObjectDescription,
    ScenarioTemplate, Service, ServiceImplementation, Setting, TaskDescription,
};
pub use difficulty::{Difficulty, DifficultyRange, SettingFit};
pub use ids::{
    AgentType, ImplementationId, ObjectDescId, ObjectInstanceId, SchemaId, ServiceId, SettingId,
    TaskDescId, TaskInstanceId,
};
pub use instances::{InstanceIds, ObjectInstance, ObjectKind, TaskInstance, TaskKind};
