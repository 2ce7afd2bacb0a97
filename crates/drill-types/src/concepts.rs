//! Domain concepts: the immutable knowledge a scenario is generated from.
//!
//! Every concept has a stable `id` and a display `name`, and two concepts are
//! equal when both match. Concepts reference each other by id only; the
//! domain index resolves those references.
//!
//! | Concept | Role |
//! |---------|------|
//! | [`Service`] | Hierarchical capability tag |
//! | [`ObjectDescription`] | Something that can exist in the world (object or agent, concrete or type) |
//! | [`TaskDescription`] | Composite task (has schemas) or atomic action (requires services) |
//! | [`DecompositionSchema`] | HTN method rewriting one task into ordered subtasks |
//! | [`ServiceImplementation`] | Recipe by which an object offers a service |
//! | [`Setting`] | Environmental context used for plausibility scoring |
//! | [`ScenarioTemplate`] | Named ordered list of top-level tasks |

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::difficulty::{DifficultyRange, SettingFit};
use crate::ids::{
    AgentType, ImplementationId, ObjectDescId, SchemaId, ServiceId, SettingId, TaskDescId,
};

/// Common accessors of every domain concept.
pub trait Concept {
    /// The identifier type of the concept.
    type Id;

    /// Stable identifier.
    fn id(&self) -> &Self::Id;

    /// Display name.
    fn name(&self) -> &str;
}

/// Implements [`Concept`] plus `(id, name)` equality and hashing.
macro_rules! impl_concept {
    ($ty:ty, $id:ty) => {
        impl Concept for $ty {
            type Id = $id;

            fn id(&self) -> &$id {
                &self.id
            }

            fn name(&self) -> &str {
                &self.name
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id && self.name == other.name
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
                self.name.hash(state);
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// A capability an object or agent can offer. Services form a forest where
/// children are more specific than their ancestors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Stable identifier.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Parent service, `None` for a root.
    #[serde(default)]
    pub parent: Option<ServiceId>,
    /// Direct child services.
    #[serde(default)]
    pub children: Vec<ServiceId>,
}

impl_concept!(Service, ServiceId);

// ---------------------------------------------------------------------------
// Object descriptions
// ---------------------------------------------------------------------------

/// Shape-specific part of an [`ObjectDescription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionShape {
    /// A leaf that can be instantiated directly.
    Concrete {
        /// Fit per setting; settings not listed are neutral.
        #[serde(default)]
        setting_fit: BTreeMap<SettingId, SettingFit>,
    },
    /// An internal node specialised by its children.
    Type {
        /// Concrete or type descriptions that specialise this one.
        #[serde(default)]
        children: Vec<ObjectDescId>,
    },
}

/// Anything that can exist in the scenario world: an inanimate object or an
/// agent, described either concretely or as a type with children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDescription {
    /// Stable identifier.
    pub id: ObjectDescId,
    /// Display name.
    pub name: String,
    /// Service implementations offered directly by this description.
    #[serde(default)]
    pub implementations: Vec<ImplementationId>,
    /// Descriptions this one inherits from (multiple inheritance).
    #[serde(default)]
    pub parents: Vec<ObjectDescId>,
    /// Agent type tag; `Some` marks the description as an agent.
    #[serde(default)]
    pub agent_type: Option<AgentType>,
    /// Concrete leaf or type node.
    pub shape: DescriptionShape,
}

impl_concept!(ObjectDescription, ObjectDescId);

impl ObjectDescription {
    /// Whether this description describes an agent usable as an actor.
    pub const fn is_agent(&self) -> bool {
        self.agent_type.is_some()
    }

    /// Whether this description is a concrete leaf.
    pub const fn is_concrete(&self) -> bool {
        matches!(self.shape, DescriptionShape::Concrete { .. })
    }

    /// Direct fit in `setting` for a concrete description, `None` for a type.
    pub fn setting_fit(&self, setting: &SettingId) -> Option<SettingFit> {
        match &self.shape {
            DescriptionShape::Concrete { setting_fit } => {
                Some(setting_fit.get(setting).copied().unwrap_or_default())
            }
            DescriptionShape::Type { .. } => None,
        }
    }

    /// Children of a type description; empty for a concrete one.
    pub fn children(&self) -> &[ObjectDescId] {
        match &self.shape {
            DescriptionShape::Concrete { .. } => &[],
            DescriptionShape::Type { children } => children,
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks and schemas
// ---------------------------------------------------------------------------

/// A task as described by the domain. Composite when it has decompositions,
/// atomic (an action) otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescription {
    /// Stable identifier.
    pub id: TaskDescId,
    /// Display name.
    pub name: String,
    /// Schemas that can decompose this task.
    #[serde(default)]
    pub decompositions: Vec<SchemaId>,
    /// Services an atomic task requires before it can be performed.
    #[serde(default)]
    pub required_services: Vec<ServiceId>,
}

impl_concept!(TaskDescription, TaskDescId);

impl TaskDescription {
    /// Whether the task is atomic (has no decompositions).
    pub fn is_atomic(&self) -> bool {
        self.decompositions.is_empty()
    }
}

/// An HTN method: rewrites one task into an ordered list of subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionSchema {
    /// Stable identifier.
    pub id: SchemaId,
    /// Display name.
    pub name: String,
    /// The task this schema decomposes.
    pub task: TaskDescId,
    /// Ordered subtasks replacing the task.
    pub subtasks: Vec<TaskDescId>,
    /// Services that must be offered before the schema applies.
    #[serde(default)]
    pub service_preconditions: Vec<ServiceId>,
    /// Objects that must already exist before the schema applies.
    #[serde(default)]
    pub object_preconditions: Vec<ObjectDescId>,
    /// Difficulty range the schema is suited for.
    pub difficulty: DifficultyRange,
}

impl_concept!(DecompositionSchema, SchemaId);

// ---------------------------------------------------------------------------
// Service implementations
// ---------------------------------------------------------------------------

/// Actor required to perform one precondition action of an implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActorRequirement {
    /// The serving object performs the action itself (written `Self`).
    Itself,
    /// Any agent of the given type.
    OfType(AgentType),
}

impl ActorRequirement {
    /// Sentinel used in domain documents for [`ActorRequirement::Itself`].
    pub const SELF_SENTINEL: &'static str = "Self";
}

impl From<String> for ActorRequirement {
    fn from(raw: String) -> Self {
        if raw.eq_ignore_ascii_case(Self::SELF_SENTINEL) {
            Self::Itself
        } else {
            Self::OfType(AgentType::from(raw))
        }
    }
}

impl From<ActorRequirement> for String {
    fn from(actor: ActorRequirement) -> Self {
        match actor {
            ActorRequirement::Itself => ActorRequirement::SELF_SENTINEL.to_owned(),
            ActorRequirement::OfType(agent_type) => agent_type.into_inner(),
        }
    }
}

/// How one object description offers one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceImplementation {
    /// Stable identifier.
    pub id: ImplementationId,
    /// Display name.
    pub name: String,
    /// The service offered.
    pub service: ServiceId,
    /// The description that offers it.
    pub object: ObjectDescId,
    /// Atomic actions that must happen before the service is available.
    #[serde(default)]
    pub actions: Vec<TaskDescId>,
    /// Actor per action, parallel to `actions`.
    #[serde(default)]
    pub actors: Vec<ActorRequirement>,
    /// Implementations that cannot coexist with this one on one instance.
    #[serde(default)]
    pub constraints: Vec<ImplementationId>,
    /// Difficulty range the implementation can be offered at.
    pub difficulty: DifficultyRange,
}

impl_concept!(ServiceImplementation, ImplementationId);

impl ServiceImplementation {
    /// Whether offering the service requires no precondition actions.
    pub fn is_unconditional(&self) -> bool {
        self.actions.is_empty()
    }

    /// Precondition actions paired with their required actor.
    pub fn steps(&self) -> impl Iterator<Item = (&TaskDescId, &ActorRequirement)> {
        self.actions.iter().zip(self.actors.iter())
    }

    /// Whether this implementation forbids `other` on the same instance.
    pub fn conflicts_with(&self, other: &ImplementationId) -> bool {
        self.constraints.iter().any(|c| c == other)
    }
}

// ---------------------------------------------------------------------------
// Settings and templates
// ---------------------------------------------------------------------------

/// Environmental context of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    /// Stable identifier.
    pub id: SettingId,
    /// Display name.
    pub name: String,
}

impl_concept!(Setting, SettingId);

/// Named ordered list of top-level tasks a scenario starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    /// Template name (templates are looked up by name).
    pub name: String,
    /// Top-level tasks in execution order.
    pub tasks: Vec<TaskDescId>,
}
