//! Scenario-local instances of domain concepts.
//!
//! Instances are created while a scenario is generated and are owned by the
//! scenario timeline. Their ids come from an [`InstanceIds`] allocator held
//! by the generation context, so two independent generations never share a
//! counter.

use serde::{Deserialize, Serialize};

use crate::ids::{ObjectDescId, ObjectInstanceId, TaskDescId, TaskInstanceId};

/// Whether a task instance still needs decomposing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// The description has decompositions.
    Composite,
    /// The description is an action with no decompositions.
    Atomic,
}

/// A task placed in the planning or story sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Scenario-unique id.
    pub id: TaskInstanceId,
    /// The task description this instance realises.
    pub description: TaskDescId,
    /// Composite or atomic.
    pub kind: TaskKind,
}

impl TaskInstance {
    /// Whether the instance is an atomic action.
    pub fn is_atomic(&self) -> bool {
        self.kind == TaskKind::Atomic
    }
}

/// Whether an object instance can act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// An inanimate object.
    Object,
    /// An agent usable as an actor.
    Agent,
}

/// An object or agent placed in the scenario world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectInstance {
    /// Scenario-unique id.
    pub id: ObjectInstanceId,
    /// The concrete description this instance realises.
    pub description: ObjectDescId,
    /// Object or agent.
    pub kind: ObjectKind,
}

impl ObjectInstance {
    /// Whether the instance is an agent.
    pub fn is_agent(&self) -> bool {
        self.kind == ObjectKind::Agent
    }
}

/// Monotonic allocator for task and object instance ids.
///
/// Deliberately not `Clone`: a snapshot of a timeline must keep drawing from
/// the one allocator so ids stay unique across discarded transactions.
#[derive(Debug, Default)]
pub struct InstanceIds {
    next_task: u64,
    next_object: u64,
}

impl InstanceIds {
    /// Create an allocator starting at id 1 for both counters.
    pub const fn new() -> Self {
        Self {
            next_task: 0,
            next_object: 0,
        }
    }

    /// Allocate the next task instance id.
    pub const fn next_task(&mut self) -> TaskInstanceId {
        self.next_task = self.next_task.saturating_add(1);
        TaskInstanceId::new(self.next_task)
    }

    /// Allocate the next object instance id.
    pub const fn next_object(&mut self) -> ObjectInstanceId {
        self.next_object = self.next_object.saturating_add(1);
        ObjectInstanceId::new(self.next_object)
    }

    /// Allocate a task instance for `description`.
    pub const fn task(&mut self, description: TaskDescId, kind: TaskKind) -> TaskInstance {
        TaskInstance {
            id: self.next_task(),
            description,
            kind,
        }
    }

    /// Allocate an object instance for `description`.
    pub const fn object(&mut self, description: ObjectDescId, kind: ObjectKind) -> ObjectInstance {
        ObjectInstance {
            id: self.next_object(),
            description,
            kind,
        }
    }
}
