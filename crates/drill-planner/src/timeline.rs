//! Transactional scenario state.
//!
//! A [`Timeline`] records the scenario under construction: the trainee's
//! planning sequence, the story actions performed by other agents, the
//! objects placed in the world and which object offers which service.
//!
//! Speculative work never touches a timeline directly. Callers clone it,
//! mutate the clone and either [`Timeline::merge`] the clone back on
//! success or drop it on failure. Every collection sits behind an [`Arc`],
//! so a clone copies a handful of pointers and a collection is only copied
//! the first time a clone writes to it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use drill_domain::DomainIndex;
use drill_types::{
    AgentType, DecompositionSchema, Difficulty, ImplementationId, InstanceIds, ObjectDescId,
    ObjectInstance, ObjectInstanceId, ServiceId, ServiceImplementation, TaskDescId, TaskInstance,
    TaskInstanceId, TaskKind,
};
use serde::Serialize;

use crate::error::PlanError;

/// Which object offers a bound service, through which implementation, at
/// which difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
    /// Serving object instance.
    pub object: ObjectInstanceId,
    /// Implementation used.
    pub implementation: ImplementationId,
    /// Difficulty actually achieved.
    pub difficulty: Difficulty,
}

/// Scenario state under construction.
#[derive(Debug, Clone)]
pub struct Timeline<'d> {
    domain: &'d DomainIndex,
    planning: Arc<Vec<TaskInstance>>,
    story: Arc<Vec<TaskInstance>>,
    init_objects: Arc<Vec<ObjectInstance>>,
    dynamic_objects: Arc<Vec<ObjectInstance>>,
    /// Action -> (service, object) pairs the action uses.
    action_uses: Arc<BTreeMap<TaskInstanceId, Vec<(ServiceId, ObjectInstanceId)>>>,
    action_actor: Arc<BTreeMap<TaskInstanceId, ObjectInstanceId>>,
    action_goal: Arc<BTreeMap<TaskInstanceId, ServiceId>>,
    services: Arc<BTreeMap<ServiceId, ServiceBinding>>,
    /// Object -> implementations it currently carries.
    object_implementations: Arc<BTreeMap<ObjectInstanceId, Vec<ImplementationId>>>,
}

/// Append the values of `other` missing from `goal`.
fn merge_list<T: Clone + PartialEq>(goal: &mut Arc<Vec<T>>, other: &Arc<Vec<T>>) {
    if Arc::ptr_eq(goal, other) {
        return;
    }
    let missing: Vec<T> = other.iter().filter(|v| !goal.contains(v)).cloned().collect();
    if !missing.is_empty() {
        Arc::make_mut(goal).extend(missing);
    }
}

/// Deep-merge multimap `other` into `goal`.
fn merge_multimap<K: Ord + Clone, V: Clone + PartialEq>(
    goal: &mut Arc<BTreeMap<K, Vec<V>>>,
    other: &Arc<BTreeMap<K, Vec<V>>>,
) {
    if Arc::ptr_eq(goal, other) {
        return;
    }
    let goal = Arc::make_mut(goal);
    for (key, values) in other.iter() {
        let own = goal.entry(key.clone()).or_default();
        for value in values {
            if !own.contains(value) {
                own.push(value.clone());
            }
        }
    }
}

/// Overwrite `goal` entries with those of `other`.
fn merge_map<K: Ord + Clone, V: Clone>(goal: &mut Arc<BTreeMap<K, V>>, other: &Arc<BTreeMap<K, V>>) {
    if Arc::ptr_eq(goal, other) {
        return;
    }
    let goal = Arc::make_mut(goal);
    for (key, value) in other.iter() {
        goal.insert(key.clone(), value.clone());
    }
}

impl<'d> Timeline<'d> {
    /// Create an empty timeline over `domain`.
    pub fn new(domain: &'d DomainIndex) -> Self {
        Self {
            domain,
            planning: Arc::default(),
            story: Arc::default(),
            init_objects: Arc::default(),
            dynamic_objects: Arc::default(),
            action_uses: Arc::default(),
            action_actor: Arc::default(),
            action_goal: Arc::default(),
            services: Arc::default(),
            object_implementations: Arc::default(),
        }
    }

    /// The domain this timeline is built over.
    pub const fn domain(&self) -> &'d DomainIndex {
        self.domain
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Trainee planning sequence in execution order.
    pub fn planning(&self) -> &[TaskInstance] {
        &self.planning
    }

    /// Story actions in the order they were added.
    pub fn story(&self) -> &[TaskInstance] {
        &self.story
    }

    /// Objects placed before the scenario starts.
    pub fn init_objects(&self) -> &[ObjectInstance] {
        &self.init_objects
    }

    /// Objects and agents introduced during the scenario.
    pub fn dynamic_objects(&self) -> &[ObjectInstance] {
        &self.dynamic_objects
    }

    /// Every present object, initial placements first.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectInstance> {
        self.init_objects.iter().chain(self.dynamic_objects.iter())
    }

    /// Present object with the given id.
    pub fn object(&self, id: ObjectInstanceId) -> Option<&ObjectInstance> {
        self.objects().find(|o| o.id == id)
    }

    /// Whether an object with the given id is present.
    pub fn contains_object(&self, id: ObjectInstanceId) -> bool {
        self.object(id).is_some()
    }

    /// (service, object) pairs used by an action.
    pub fn action_uses(&self, action: TaskInstanceId) -> &[(ServiceId, ObjectInstanceId)] {
        self.action_uses
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Agent performing a story action.
    pub fn actor_of(&self, action: TaskInstanceId) -> Option<ObjectInstanceId> {
        self.action_actor.get(&action).copied()
    }

    /// Service a story action is performed to obtain.
    pub fn goal_of(&self, action: TaskInstanceId) -> Option<&ServiceId> {
        self.action_goal.get(&action)
    }

    /// Bound services in id order.
    pub fn service_bindings(&self) -> &BTreeMap<ServiceId, ServiceBinding> {
        &self.services
    }

    /// Implementations carried by an object.
    pub fn implementations_of(&self, object: ObjectInstanceId) -> &[ImplementationId] {
        self.object_implementations
            .get(&object)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Object offering `service`, bound under the service itself or under
    /// one of its descendants.
    pub fn is_service_offered(&self, service: &ServiceId) -> Option<&ObjectInstance> {
        let binding = self.services.get(service).or_else(|| {
            self.services
                .iter()
                .find(|(bound, _)| self.domain.is_service_child(service, bound))
                .map(|(_, binding)| binding)
        })?;
        self.object(binding.object)
    }

    /// A present object that could offer `service` without conflict, with
    /// the implementations it could use. The first capable object wins.
    pub fn could_offer_service(
        &self,
        service: &ServiceId,
    ) -> Option<(&ObjectInstance, Vec<&'d ServiceImplementation>)> {
        self.objects().find_map(|object| {
            let usable: Vec<_> = self
                .domain
                .implementations_for(&object.description, service)
                .into_iter()
                .filter(|implementation| self.satisfies_constraints(object.id, implementation))
                .collect();
            (!usable.is_empty()).then_some((object, usable))
        })
    }

    /// Present objects whose description is `description` or inherits from it.
    pub fn contains_object_description(&self, description: &ObjectDescId) -> Vec<&ObjectInstance> {
        self.objects()
            .filter(|o| self.domain.descends_from(&o.description, description))
            .collect()
    }

    /// Whether `object` can take `implementation`: false iff it already
    /// carries an implementation listed in the implementation's constraints.
    pub fn satisfies_constraints(
        &self,
        object: ObjectInstanceId,
        implementation: &ServiceImplementation,
    ) -> bool {
        !self
            .implementations_of(object)
            .iter()
            .any(|carried| implementation.conflicts_with(carried))
    }

    /// A present agent of `agent_type` (or a subtype).
    pub fn agent_by_type(&self, agent_type: &AgentType) -> Option<&ObjectInstance> {
        self.objects()
            .filter(|o| o.is_agent())
            .find(|o| self.domain.matches_type(&o.description, agent_type))
    }

    // -------------------------------------------------------------------
    // Mutators
    // -------------------------------------------------------------------

    fn instantiate_task(
        &self,
        description: &TaskDescId,
        ids: &mut InstanceIds,
    ) -> Result<TaskInstance, PlanError> {
        let kind = if self.domain.task(description)?.is_atomic() {
            TaskKind::Atomic
        } else {
            TaskKind::Composite
        };
        Ok(ids.task(description.clone(), kind))
    }

    /// Append the template's top-level tasks to the planning sequence.
    pub fn add_template(
        &mut self,
        tasks: &[TaskDescId],
        ids: &mut InstanceIds,
    ) -> Result<Vec<TaskInstance>, PlanError> {
        let instances = tasks
            .iter()
            .map(|task| self.instantiate_task(task, ids))
            .collect::<Result<Vec<_>, _>>()?;
        Arc::make_mut(&mut self.planning).extend(instances.iter().cloned());
        Ok(instances)
    }

    /// Replace planning task `task` by the schema's subtasks, in place.
    ///
    /// Returns the new subtask instances, or `None` if `task` is not in the
    /// planning sequence.
    pub fn decompose_task(
        &mut self,
        task: TaskInstanceId,
        schema: &DecompositionSchema,
        ids: &mut InstanceIds,
    ) -> Result<Option<Vec<TaskInstance>>, PlanError> {
        let Some(position) = self.planning.iter().position(|t| t.id == task) else {
            return Ok(None);
        };
        let subtasks = schema
            .subtasks
            .iter()
            .map(|subtask| self.instantiate_task(subtask, ids))
            .collect::<Result<Vec<_>, _>>()?;
        let planning = Arc::make_mut(&mut self.planning);
        let end = position.saturating_add(1);
        planning.splice(position..end, subtasks.iter().cloned());
        Ok(Some(subtasks))
    }

    /// Add a story action performed to obtain `goal`.
    pub fn add_story_action(
        &mut self,
        action: &TaskDescId,
        goal: ServiceId,
        ids: &mut InstanceIds,
    ) -> Result<TaskInstance, PlanError> {
        let instance = self.instantiate_task(action, ids)?;
        Arc::make_mut(&mut self.story).push(instance.clone());
        Arc::make_mut(&mut self.action_goal).insert(instance.id, goal);
        Ok(instance)
    }

    /// Place an object in the world. An object already present stays where
    /// it is.
    pub fn add_new_object(&mut self, object: ObjectInstance, init: bool) {
        if self.contains_object(object.id) {
            return;
        }
        let list = if init {
            &mut self.init_objects
        } else {
            &mut self.dynamic_objects
        };
        Arc::make_mut(list).push(object);
    }

    /// Record that `action` uses present `object` for `service`.
    pub fn add_action_existing_object(
        &mut self,
        action: TaskInstanceId,
        service: ServiceId,
        object: ObjectInstanceId,
    ) {
        let uses = Arc::make_mut(&mut self.action_uses).entry(action).or_default();
        let pair = (service, object);
        if !uses.contains(&pair) {
            uses.push(pair);
        }
    }

    /// Place `object` and record that `action` uses it for `service`.
    pub fn add_action_new_object(
        &mut self,
        action: TaskInstanceId,
        service: ServiceId,
        object: ObjectInstance,
        init: bool,
    ) {
        let id = object.id;
        self.add_new_object(object, init);
        self.add_action_existing_object(action, service, id);
    }

    /// Assign a present agent as the actor of `action`.
    pub fn add_action_existing_actor(&mut self, action: TaskInstanceId, actor: ObjectInstanceId) {
        Arc::make_mut(&mut self.action_actor).insert(action, actor);
    }

    /// Introduce `actor` dynamically and assign it to `action`.
    pub fn add_action_new_actor(&mut self, action: TaskInstanceId, actor: ObjectInstance) {
        let id = actor.id;
        self.add_new_object(actor, false);
        self.add_action_existing_actor(action, id);
    }

    /// Bind `service` to `object` through `implementation` at `difficulty`.
    pub fn add_service_object(
        &mut self,
        service: ServiceId,
        implementation: ImplementationId,
        object: ObjectInstanceId,
        difficulty: Difficulty,
    ) {
        let carried = Arc::make_mut(&mut self.object_implementations)
            .entry(object)
            .or_default();
        if !carried.contains(&implementation) {
            carried.push(implementation.clone());
        }
        Arc::make_mut(&mut self.services).insert(
            service,
            ServiceBinding {
                object,
                implementation,
                difficulty,
            },
        );
    }

    // -------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------

    /// Commit `other`, a snapshot cloned from this timeline, into `self`.
    ///
    /// Lists are unioned without duplicates, multimaps merged per key and
    /// scalar maps overwritten. The planning sequence is an ordered rewrite
    /// of the one it was cloned from, so the snapshot's replaces ours.
    pub fn merge(&mut self, other: Self) {
        if !Arc::ptr_eq(&self.planning, &other.planning) {
            self.planning = other.planning;
        }
        merge_list(&mut self.story, &other.story);
        merge_list(&mut self.init_objects, &other.init_objects);
        merge_list(&mut self.dynamic_objects, &other.dynamic_objects);
        merge_multimap(&mut self.action_uses, &other.action_uses);
        merge_map(&mut self.action_actor, &other.action_actor);
        merge_map(&mut self.action_goal, &other.action_goal);
        merge_map(&mut self.services, &other.services);
        merge_multimap(&mut self.object_implementations, &other.object_implementations);
    }

    // -------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------

    /// Human-readable listing of the scenario.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn task_name<'a>(&'a self, id: &'a TaskDescId) -> &'a str {
        self.domain.task(id).map_or(id.as_str(), |t| t.name.as_str())
    }

    fn service_name<'a>(&'a self, id: &'a ServiceId) -> &'a str {
        self.domain.service(id).map_or(id.as_str(), |s| s.name.as_str())
    }

    fn object_label(&self, id: ObjectInstanceId) -> String {
        let name = self
            .object(id)
            .and_then(|o| self.domain.object(&o.description).ok())
            .map_or("?", |d| d.name.as_str());
        format!("{name}({id})")
    }

    fn write_uses(&self, f: &mut fmt::Formatter<'_>, action: TaskInstanceId) -> fmt::Result {
        let uses = self.action_uses(action);
        if uses.is_empty() {
            return Ok(());
        }
        f.write_str(" using")?;
        for (index, (service, object)) in uses.iter().enumerate() {
            let separator = if index == 0 { " " } else { ", " };
            write!(
                f,
                "{separator}{} for {}",
                self.object_label(*object),
                self.service_name(service)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Timeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Planning:")?;
        for task in self.planning.iter() {
            write!(f, "  {}", self.task_name(&task.description))?;
            self.write_uses(f, task.id)?;
            writeln!(f)?;
        }

        writeln!(f, "\nStory:")?;
        for action in self.story.iter().rev() {
            f.write_str("  ")?;
            if let Some(actor) = self.actor_of(action.id) {
                write!(f, "{} ", self.object_label(actor))?;
            }
            write!(f, "performs {}", self.task_name(&action.description))?;
            if let Some(goal) = self.goal_of(action.id) {
                write!(f, " to obtain {}", self.service_name(goal))?;
            }
            self.write_uses(f, action.id)?;
            writeln!(f)?;
        }

        writeln!(f, "\nInit objects:")?;
        for object in self.init_objects.iter() {
            writeln!(f, "  {}", self.object_label(object.id))?;
        }

        writeln!(f, "\nDynamic objects:")?;
        for object in self.dynamic_objects.iter() {
            writeln!(f, "  {}", self.object_label(object.id))?;
        }

        writeln!(f, "\nServices:")?;
        for (service, binding) in self.services.iter() {
            writeln!(
                f,
                "  {} offers {} at level {}",
                self.object_label(binding.object),
                self.service_name(service),
                binding.difficulty
            )?;
        }
        Ok(())
    }
}
