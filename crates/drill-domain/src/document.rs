//! YAML domain documents.
//!
//! A [`DomainDocument`] is the on-disk form of a domain. Entries reference
//! each other by id; names default to the id when omitted. Reverse links
//! (service children, type children, task decompositions, object offers) may
//! be written on either side; the builder completes the other.
//!
//! ```yaml
//! services:
//!   - { id: light }
//! settings:
//!   - { id: home, name: Home }
//! objects:
//!   - id: lamp
//!     kind: object
//!     offers: [lamp_light]
//!     expected_settings: [home]
//! implementations:
//!   - { id: lamp_light, service: light, object: lamp, min_difficulty: 1, max_difficulty: 3 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use drill_types::{
    ActorRequirement, AgentType, DecompositionSchema, DescriptionShape, Difficulty,
    DifficultyRange, ImplementationId, ObjectDescId, ObjectDescription, SchemaId,
    ScenarioTemplate, Service, ServiceId, ServiceImplementation, Setting, SettingFit, SettingId,
    TaskDescId, TaskDescription,
};
use serde::Deserialize;

use crate::builder::DomainBuilder;
use crate::error::DomainError;
use crate::index::DomainIndex;

/// Serde model of a complete domain file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainDocument {
    /// Service hierarchy.
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    /// Settings scenarios can take place in.
    #[serde(default)]
    pub settings: Vec<SettingEntry>,
    /// Object and agent descriptions.
    #[serde(default)]
    pub objects: Vec<ObjectEntry>,
    /// Composite and atomic tasks.
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    /// Decomposition schemas.
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
    /// Service implementations.
    #[serde(default)]
    pub implementations: Vec<ImplementationEntry>,
    /// Scenario templates.
    #[serde(default)]
    pub templates: Vec<ScenarioTemplate>,
}

/// A service entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    /// Stable id.
    pub id: ServiceId,
    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
    /// Parent service.
    #[serde(default)]
    pub parent: Option<ServiceId>,
    /// Child services.
    #[serde(default)]
    pub children: Vec<ServiceId>,
}

/// A setting entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingEntry {
    /// Stable id.
    pub id: SettingId,
    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
}

/// Declared kind of an [`ObjectEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectEntryKind {
    /// Concrete inanimate object.
    Object,
    /// Type of inanimate object.
    ObjectType,
    /// Concrete agent.
    Agent,
    /// Type of agent.
    AgentType,
}

impl ObjectEntryKind {
    const fn is_type(self) -> bool {
        matches!(self, Self::ObjectType | Self::AgentType)
    }

    const fn is_agent(self) -> bool {
        matches!(self, Self::Agent | Self::AgentType)
    }
}

/// An object or agent description entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntry {
    /// Stable id.
    pub id: ObjectDescId,
    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
    /// Concrete or type, object or agent.
    pub kind: ObjectEntryKind,
    /// Implementations this description offers.
    #[serde(default)]
    pub offers: Vec<ImplementationId>,
    /// Parent descriptions.
    #[serde(default)]
    pub parents: Vec<ObjectDescId>,
    /// Child descriptions (types only).
    #[serde(default)]
    pub children: Vec<ObjectDescId>,
    /// Settings the object is expected in (concrete only).
    #[serde(default)]
    pub expected_settings: Vec<SettingId>,
    /// Settings the object would be out of place in (concrete only).
    #[serde(default)]
    pub unexpected_settings: Vec<SettingId>,
    /// Agent type tag. Agent types require it; concrete agents may inherit it.
    #[serde(default)]
    pub agent_type: Option<AgentType>,
}

/// A task entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    /// Stable id.
    pub id: TaskDescId,
    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
    /// Schemas decomposing the task (may instead be named by the schemas).
    #[serde(default)]
    pub decompositions: Vec<SchemaId>,
    /// Services an atomic task requires.
    #[serde(default)]
    pub requires: Vec<ServiceId>,
}

/// A decomposition schema entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaEntry {
    /// Stable id.
    pub id: SchemaId,
    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
    /// Task the schema decomposes.
    pub task: TaskDescId,
    /// Ordered subtasks.
    pub subtasks: Vec<TaskDescId>,
    /// Required services.
    #[serde(default)]
    pub service_preconditions: Vec<ServiceId>,
    /// Required objects.
    #[serde(default)]
    pub object_preconditions: Vec<ObjectDescId>,
    /// Lowest suited difficulty.
    pub min_difficulty: Difficulty,
    /// Highest suited difficulty.
    pub max_difficulty: Difficulty,
}

/// A service implementation entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ImplementationEntry {
    /// Stable id.
    pub id: ImplementationId,
    /// Display name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
    /// Service offered.
    pub service: ServiceId,
    /// Offering description.
    pub object: ObjectDescId,
    /// Precondition actions.
    #[serde(default)]
    pub actions: Vec<TaskDescId>,
    /// Actor per action (`Self` or an agent type).
    #[serde(default)]
    pub actors: Vec<ActorRequirement>,
    /// Incompatible implementations.
    #[serde(default)]
    pub constraints: Vec<ImplementationId>,
    /// Lowest achievable difficulty.
    pub min_difficulty: Difficulty,
    /// Highest achievable difficulty.
    pub max_difficulty: Difficulty,
}

fn display_name(name: Option<String>, id: &str) -> String {
    name.unwrap_or_else(|| id.to_owned())
}

impl ObjectEntry {
    fn into_description(self) -> Result<ObjectDescription, DomainError> {
        let invalid = |reason| DomainError::InvalidObject {
            id: self.id.clone(),
            reason,
        };
        if self.kind.is_type() {
            if !self.expected_settings.is_empty() || !self.unexpected_settings.is_empty() {
                return Err(invalid("type descriptions cannot carry setting fit"));
            }
            if self.kind == ObjectEntryKind::AgentType && self.agent_type.is_none() {
                return Err(invalid("agent types need an agent_type tag"));
            }
        } else if !self.children.is_empty() {
            return Err(invalid("concrete descriptions cannot have children"));
        }
        if !self.kind.is_agent() && self.agent_type.is_some() {
            return Err(invalid("only agents carry an agent_type tag"));
        }

        let shape = if self.kind.is_type() {
            DescriptionShape::Type {
                children: self.children,
            }
        } else {
            let mut setting_fit = BTreeMap::new();
            for setting in self.expected_settings {
                setting_fit.insert(setting, SettingFit::Expected);
            }
            for setting in self.unexpected_settings {
                if setting_fit.insert(setting, SettingFit::Unexpected).is_some() {
                    return Err(invalid("setting listed as both expected and unexpected"));
                }
            }
            DescriptionShape::Concrete { setting_fit }
        };

        Ok(ObjectDescription {
            name: display_name(self.name, self.id.as_str()),
            id: self.id,
            implementations: self.offers,
            parents: self.parents,
            agent_type: self.agent_type,
            shape,
        })
    }
}

impl DomainDocument {
    /// Parse a document from YAML.
    pub fn parse(yaml: &str) -> Result<Self, DomainError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Feed every entry into a fresh [`DomainBuilder`].
    pub fn into_builder(self) -> Result<DomainBuilder, DomainError> {
        let mut builder = DomainBuilder::new();

        for entry in self.services {
            builder.add_service(Service {
                name: display_name(entry.name, entry.id.as_str()),
                id: entry.id,
                parent: entry.parent,
                children: entry.children,
            })?;
        }
        for entry in self.settings {
            builder.add_setting(Setting {
                name: display_name(entry.name, entry.id.as_str()),
                id: entry.id,
            })?;
        }
        for entry in self.objects {
            if entry.kind == ObjectEntryKind::Agent {
                builder.add_agent(entry.into_description()?)?;
            } else {
                builder.add_object(entry.into_description()?)?;
            }
        }
        for entry in self.tasks {
            builder.add_task(TaskDescription {
                name: display_name(entry.name, entry.id.as_str()),
                id: entry.id,
                decompositions: entry.decompositions,
                required_services: entry.requires,
            })?;
        }
        for entry in self.schemas {
            builder.add_schema(DecompositionSchema {
                name: display_name(entry.name, entry.id.as_str()),
                id: entry.id,
                task: entry.task,
                subtasks: entry.subtasks,
                service_preconditions: entry.service_preconditions,
                object_preconditions: entry.object_preconditions,
                difficulty: DifficultyRange::new(entry.min_difficulty, entry.max_difficulty),
            })?;
        }
        for entry in self.implementations {
            builder.add_implementation(ServiceImplementation {
                name: display_name(entry.name, entry.id.as_str()),
                id: entry.id,
                service: entry.service,
                object: entry.object,
                actions: entry.actions,
                actors: entry.actors,
                constraints: entry.constraints,
                difficulty: DifficultyRange::new(entry.min_difficulty, entry.max_difficulty),
            })?;
        }
        for template in self.templates {
            builder.add_template(template)?;
        }

        Ok(builder)
    }
}

impl DomainIndex {
    /// Load and validate a domain from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Yaml`] for malformed YAML, or the first
    /// validation error found by [`DomainBuilder::build`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DomainError> {
        DomainDocument::parse(yaml)?.into_builder()?.build()
    }

    /// Load and validate a domain from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Io`] if the file cannot be read, otherwise as
    /// [`DomainIndex::from_yaml_str`].
    pub fn from_file(path: &Path) -> Result<Self, DomainError> {
        let contents = std::fs::read_to_string(path)?;
        let index = Self::from_yaml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            services = index.services.len(),
            objects = index.objects.len(),
            tasks = index.tasks.len(),
            "Domain loaded"
        );
        Ok(index)
    }
}
