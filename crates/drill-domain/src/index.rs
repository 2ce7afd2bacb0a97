//! Read-only, hierarchy-aware index over a loaded domain.
//!
//! The [`DomainIndex`] owns every concept of a domain and answers the
//! inheritance-aware questions the planner asks: which services specialise a
//! service, which implementations an object (or any ancestor) offers, which
//! agent descriptions have a given type. It is immutable after
//! [`DomainBuilder::build`] and is `Send + Sync`, so one index can serve any
//! number of independent generations.
//!
//! Service and object hierarchies are graphs keyed by id. Every traversal
//! keeps an explicit visited set, so malformed (cyclic) input terminates.
//!
//! [`DomainBuilder::build`]: crate::builder::DomainBuilder::build

use std::collections::{BTreeMap, BTreeSet};

use drill_types::{
    AgentType, DecompositionSchema, ImplementationId, ObjectDescId, ObjectDescription, SchemaId,
    ScenarioTemplate, Service, ServiceId, ServiceImplementation, Setting, SettingId, TaskDescId,
    TaskDescription,
};

use crate::error::DomainError;

/// Immutable index of all concepts of one domain.
#[derive(Debug, Clone, Default)]
pub struct DomainIndex {
    pub(crate) services: BTreeMap<ServiceId, Service>,
    pub(crate) objects: BTreeMap<ObjectDescId, ObjectDescription>,
    pub(crate) tasks: BTreeMap<TaskDescId, TaskDescription>,
    pub(crate) schemas: BTreeMap<SchemaId, DecompositionSchema>,
    pub(crate) implementations: BTreeMap<ImplementationId, ServiceImplementation>,
    pub(crate) settings: BTreeMap<SettingId, Setting>,
    pub(crate) templates: BTreeMap<String, ScenarioTemplate>,
    /// Service -> implementations of it or of any descendant.
    pub(crate) providers: BTreeMap<ServiceId, Vec<ImplementationId>>,
}

impl DomainIndex {
    // -------------------------------------------------------------------
    // Lookup by id
    // -------------------------------------------------------------------

    /// Look up a service.
    pub fn service(&self, id: &ServiceId) -> Result<&Service, DomainError> {
        self.services
            .get(id)
            .ok_or_else(|| DomainError::ServiceNotFound(id.clone()))
    }

    /// Look up an object or agent description.
    pub fn object(&self, id: &ObjectDescId) -> Result<&ObjectDescription, DomainError> {
        self.objects
            .get(id)
            .ok_or_else(|| DomainError::ObjectNotFound(id.clone()))
    }

    /// Look up a task description.
    pub fn task(&self, id: &TaskDescId) -> Result<&TaskDescription, DomainError> {
        self.tasks
            .get(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))
    }

    /// Look up a decomposition schema.
    pub fn schema(&self, id: &SchemaId) -> Result<&DecompositionSchema, DomainError> {
        self.schemas
            .get(id)
            .ok_or_else(|| DomainError::SchemaNotFound(id.clone()))
    }

    /// Look up a service implementation.
    pub fn implementation(
        &self,
        id: &ImplementationId,
    ) -> Result<&ServiceImplementation, DomainError> {
        self.implementations
            .get(id)
            .ok_or_else(|| DomainError::ImplementationNotFound(id.clone()))
    }

    /// Look up a setting.
    pub fn setting(&self, id: &SettingId) -> Result<&Setting, DomainError> {
        self.settings
            .get(id)
            .ok_or_else(|| DomainError::SettingNotFound(id.clone()))
    }

    /// Schemas that decompose `task`, in declaration order.
    pub fn schemas_for(&self, task: &TaskDescId) -> Result<Vec<&DecompositionSchema>, DomainError> {
        self.task(task)?
            .decompositions
            .iter()
            .map(|id| self.schema(id))
            .collect()
    }

    // -------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------

    /// All services in id order.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// All object and agent descriptions in id order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectDescription> {
        self.objects.values()
    }

    /// All task descriptions in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDescription> {
        self.tasks.values()
    }

    /// All service implementations in id order.
    pub fn implementations(&self) -> impl Iterator<Item = &ServiceImplementation> {
        self.implementations.values()
    }

    /// All settings in id order.
    pub fn settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.values()
    }

    /// All scenario templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &ScenarioTemplate> {
        self.templates.values()
    }

    // -------------------------------------------------------------------
    // Name lookup
    // -------------------------------------------------------------------

    /// Scenario template by name; exact match first, then case-insensitive.
    pub fn template(&self, name: &str) -> Option<&ScenarioTemplate> {
        self.templates.get(name).or_else(|| {
            self.templates
                .values()
                .find(|t| t.name.eq_ignore_ascii_case(name))
        })
    }

    /// Id of the task whose name (or id) matches `name`, ignoring case.
    pub fn task_id_by_name(&self, name: &str) -> Option<&TaskDescId> {
        self.tasks
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name) || t.id.as_str().eq_ignore_ascii_case(name))
            .map(|t| &t.id)
    }

    /// Setting whose name (or id) matches `name`, ignoring case.
    pub fn setting_by_name(&self, name: &str) -> Option<&Setting> {
        self.settings
            .values()
            .find(|s| s.name.eq_ignore_ascii_case(name) || s.id.as_str().eq_ignore_ascii_case(name))
    }

    // -------------------------------------------------------------------
    // Service hierarchy
    // -------------------------------------------------------------------

    /// Whether `candidate` is reachable from `parent` through child links.
    ///
    /// A service is not its own child.
    pub fn is_service_child(&self, parent: &ServiceId, candidate: &ServiceId) -> bool {
        let Some(root) = self.services.get(parent) else {
            return false;
        };
        let mut visited: BTreeSet<&ServiceId> = BTreeSet::new();
        let mut stack: Vec<&ServiceId> = root.children.iter().collect();
        while let Some(id) = stack.pop() {
            if id == candidate {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(service) = self.services.get(id) {
                stack.extend(service.children.iter());
            }
        }
        false
    }

    /// Whether `offered` is `requested` itself or one of its descendants.
    pub fn covers_service(&self, requested: &ServiceId, offered: &ServiceId) -> bool {
        requested == offered || self.is_service_child(requested, offered)
    }

    /// Ancestors of `service`, nearest first.
    pub fn service_ancestors(&self, service: &ServiceId) -> Vec<&ServiceId> {
        let mut ancestors = Vec::new();
        let mut visited: BTreeSet<&ServiceId> = BTreeSet::new();
        let mut current = self.services.get(service).and_then(|s| s.parent.as_ref());
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            ancestors.push(id);
            current = self.services.get(id).and_then(|s| s.parent.as_ref());
        }
        ancestors
    }

    /// Every implementation registered for `service`: implementations of the
    /// service itself or of any descendant, in id order.
    pub fn providers_of(&self, service: &ServiceId) -> Vec<&ServiceImplementation> {
        self.providers
            .get(service)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.implementations.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------
    // Object hierarchy
    // -------------------------------------------------------------------

    /// `object` followed by all of its ancestors, depth-first, each once.
    fn lineage(&self, object: &ObjectDescId) -> Vec<&ObjectDescription> {
        let mut lineage = Vec::new();
        let mut visited: BTreeSet<&ObjectDescId> = BTreeSet::new();
        let mut stack: Vec<&ObjectDescId> = self
            .objects
            .get_key_value(object)
            .map(|(id, _)| id)
            .into_iter()
            .collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(description) = self.objects.get(id) {
                lineage.push(description);
                stack.extend(description.parents.iter().rev());
            }
        }
        lineage
    }

    /// Whether `object` is `ancestor` or inherits from it transitively.
    pub fn descends_from(&self, object: &ObjectDescId, ancestor: &ObjectDescId) -> bool {
        self.lineage(object).iter().any(|d| &d.id == ancestor)
    }

    /// Implementations offered by `object` or any ancestor whose service is
    /// `service` or one of its descendants. Each implementation appears once.
    pub fn implementations_for(
        &self,
        object: &ObjectDescId,
        service: &ServiceId,
    ) -> Vec<&ServiceImplementation> {
        let mut seen: BTreeSet<&ImplementationId> = BTreeSet::new();
        let mut found = Vec::new();
        for description in self.lineage(object) {
            for id in &description.implementations {
                let Some(implementation) = self.implementations.get(id) else {
                    continue;
                };
                if self.covers_service(service, &implementation.service) && seen.insert(id) {
                    found.push(implementation);
                }
            }
        }
        found
    }

    /// Agent type of `object`, its own tag first, then the nearest ancestor's.
    pub fn agent_type_of(&self, object: &ObjectDescId) -> Option<&AgentType> {
        self.lineage(object)
            .into_iter()
            .find_map(|description| description.agent_type.as_ref())
    }

    /// Whether `object` (or an ancestor) is an agent description.
    pub fn is_agent(&self, object: &ObjectDescId) -> bool {
        self.agent_type_of(object).is_some()
    }

    /// Whether `object` or any ancestor carries `agent_type` (ignoring case).
    pub fn matches_type(&self, object: &ObjectDescId, agent_type: &AgentType) -> bool {
        self.lineage(object).iter().any(|description| {
            description
                .agent_type
                .as_ref()
                .is_some_and(|t| t.as_str().eq_ignore_ascii_case(agent_type.as_str()))
        })
    }

    /// Concrete agent descriptions of `agent_type`, in id order.
    pub fn agents_of_type(&self, agent_type: &AgentType) -> Vec<&ObjectDescription> {
        self.objects
            .values()
            .filter(|description| description.is_concrete())
            .filter(|description| self.matches_type(&description.id, agent_type))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::DomainDocument;

    const FIXTURE: &str = r"
services:
  - { id: light }
  - { id: electric_light, parent: light }
  - { id: bright_light, parent: electric_light }
  - { id: first_aid }
settings:
  - { id: home, name: Home }
objects:
  - { id: light_source, kind: object_type, children: [lamp, torch] }
  - { id: lamp, kind: object, parents: [light_source], offers: [lamp_light] }
  - { id: torch, kind: object, parents: [light_source], offers: [torch_light] }
  - { id: person, kind: agent_type, agent_type: person }
  - { id: medic, kind: agent_type, parents: [person], agent_type: medic }
  - { id: nurse, kind: agent, parents: [medic], offers: [nurse_aid] }
  - { id: passer_by, kind: agent, parents: [person] }
tasks:
  - { id: help, name: Help victim }
  - { id: switch_on, name: Switch on }
schemas:
  - { id: s_help, task: help, subtasks: [switch_on], min_difficulty: 1, max_difficulty: 2 }
implementations:
  - { id: lamp_light, service: electric_light, object: lamp, min_difficulty: 1, max_difficulty: 2 }
  - { id: torch_light, service: bright_light, object: torch, min_difficulty: 2, max_difficulty: 3 }
  - { id: nurse_aid, service: first_aid, object: nurse, min_difficulty: 1, max_difficulty: 3 }
templates:
  - { name: basic, tasks: [help] }
";

    fn index() -> DomainIndex {
        DomainIndex::from_yaml_str(FIXTURE).unwrap()
    }

    #[test]
    fn service_children_are_transitive() {
        let index = index();
        let light = ServiceId::from("light");
        assert!(index.is_service_child(&light, &ServiceId::from("bright_light")));
        assert!(!index.is_service_child(&light, &light));
        assert!(index.covers_service(&light, &light));
        assert!(!index.is_service_child(&ServiceId::from("bright_light"), &light));
    }

    #[test]
    fn providers_include_descendant_implementations() {
        let index = index();
        let ids: Vec<_> = index
            .providers_of(&ServiceId::from("light"))
            .iter()
            .map(|i| i.id.as_str().to_owned())
            .collect();
        assert_eq!(ids, vec!["lamp_light", "torch_light"]);
        assert_eq!(index.providers_of(&ServiceId::from("bright_light")).len(), 1);
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let index = index();
        let ancestors = index.service_ancestors(&ServiceId::from("bright_light"));
        assert_eq!(ancestors.len(), 2);
        assert_eq!(ancestors.first().unwrap().as_str(), "electric_light");
    }

    #[test]
    fn implementations_for_filters_by_service() {
        let index = index();
        let lamp = ObjectDescId::from("lamp");
        assert_eq!(index.implementations_for(&lamp, &ServiceId::from("light")).len(), 1);
        assert!(index.implementations_for(&lamp, &ServiceId::from("bright_light")).is_empty());
    }

    #[test]
    fn agent_type_is_inherited_through_two_levels() {
        let index = index();
        let nurse = ObjectDescId::from("nurse");
        assert!(index.matches_type(&nurse, &AgentType::from("Person")));
        assert!(index.matches_type(&nurse, &AgentType::from("medic")));
        assert!(!index.is_agent(&ObjectDescId::from("lamp")));
        let people: Vec<_> = index
            .agents_of_type(&AgentType::from("person"))
            .iter()
            .map(|d| d.id.as_str().to_owned())
            .collect();
        assert_eq!(people, vec!["nurse", "passer_by"]);
    }

    #[test]
    fn descends_from_follows_parents() {
        let index = index();
        let nurse = ObjectDescId::from("nurse");
        assert!(index.descends_from(&nurse, &ObjectDescId::from("person")));
        assert!(index.descends_from(&nurse, &nurse));
        assert!(!index.descends_from(&ObjectDescId::from("person"), &nurse));
    }

    #[test]
    fn name_lookup_ignores_case() {
        let index = index();
        assert_eq!(index.task_id_by_name("help VICTIM").unwrap().as_str(), "help");
        assert_eq!(index.task_id_by_name("switch_on").unwrap().as_str(), "switch_on");
        assert_eq!(index.setting_by_name("HOME").unwrap().id.as_str(), "home");
        assert!(index.template("Basic").is_some());
        assert!(index.template("advanced").is_none());
    }

    #[test]
    fn missing_lookups_are_errors() {
        let index = index();
        let err = index.task(&TaskDescId::from("nope")).err();
        assert!(matches!(err, Some(DomainError::TaskNotFound(_))));
        assert_eq!(index.schemas_for(&TaskDescId::from("help")).unwrap().len(), 1);
    }
}
