//! Validating construction of a [`DomainIndex`].
//!
//! Concepts are added one at a time; duplicates and local inconsistencies
//! (inverted difficulty ranges, actor/action arity) are rejected on insert.
//! [`DomainBuilder::build`] then completes reverse links, validates every
//! cross reference and derives the provider table.

use std::collections::BTreeMap;

use drill_types::{
    AgentType, DecompositionSchema, DescriptionShape, DifficultyRange, ImplementationId, ObjectDescId,
    ObjectDescription, ScenarioTemplate, Service, ServiceId, ServiceImplementation, Setting,
    TaskDescription,
};
use tracing::debug;

use crate::error::DomainError;
use crate::index::DomainIndex;

/// Accumulates domain concepts and builds a validated [`DomainIndex`].
#[derive(Debug, Default)]
pub struct DomainBuilder {
    index: DomainIndex,
    /// Descriptions added as agents; tagged at build time if untagged.
    agents: Vec<ObjectDescId>,
}

/// Insert `value` under `key`, rejecting an existing key.
fn insert_unique<K: Ord + ToString, V>(
    map: &mut BTreeMap<K, V>,
    kind: &'static str,
    key: K,
    value: V,
) -> Result<(), DomainError> {
    if map.contains_key(&key) {
        return Err(DomainError::DuplicateId {
            kind,
            id: key.to_string(),
        });
    }
    map.insert(key, value);
    Ok(())
}

fn check_range(kind: &'static str, id: &str, range: DifficultyRange) -> Result<(), DomainError> {
    if range.min > range.max {
        return Err(DomainError::InvertedDifficulty {
            kind,
            id: id.to_owned(),
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}

fn dangling(
    kind: &'static str,
    id: &impl ToString,
    target: &'static str,
    reference: &impl ToString,
) -> DomainError {
    DomainError::DanglingReference {
        kind,
        id: id.to_string(),
        target,
        reference: reference.to_string(),
    }
}

/// Fail with a dangling reference unless every id in `refs` is in `map`.
fn require_all<'a, K: Ord + ToString + 'a, V>(
    map: &BTreeMap<K, V>,
    refs: impl IntoIterator<Item = &'a K>,
    kind: &'static str,
    id: &impl ToString,
    target: &'static str,
) -> Result<(), DomainError> {
    for reference in refs {
        if !map.contains_key(reference) {
            return Err(dangling(kind, id, target, reference));
        }
    }
    Ok(())
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl DomainBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------

    /// Add a service.
    pub fn add_service(&mut self, service: Service) -> Result<&mut Self, DomainError> {
        insert_unique(&mut self.index.services, "service", service.id.clone(), service)?;
        Ok(self)
    }

    /// Add a setting.
    pub fn add_setting(&mut self, setting: Setting) -> Result<&mut Self, DomainError> {
        insert_unique(&mut self.index.settings, "setting", setting.id.clone(), setting)?;
        Ok(self)
    }

    /// Add an object or agent description.
    pub fn add_object(&mut self, object: ObjectDescription) -> Result<&mut Self, DomainError> {
        insert_unique(&mut self.index.objects, "object", object.id.clone(), object)?;
        Ok(self)
    }

    /// Add an agent description.
    ///
    /// An agent whose lineage carries no agent type once the hierarchy is
    /// linked is tagged with its own id.
    pub fn add_agent(&mut self, agent: ObjectDescription) -> Result<&mut Self, DomainError> {
        let id = agent.id.clone();
        self.add_object(agent)?;
        self.agents.push(id);
        Ok(self)
    }

    /// Add a task description.
    pub fn add_task(&mut self, task: TaskDescription) -> Result<&mut Self, DomainError> {
        insert_unique(&mut self.index.tasks, "task", task.id.clone(), task)?;
        Ok(self)
    }

    /// Add a decomposition schema.
    pub fn add_schema(&mut self, schema: DecompositionSchema) -> Result<&mut Self, DomainError> {
        check_range("schema", schema.id.as_str(), schema.difficulty)?;
        insert_unique(&mut self.index.schemas, "schema", schema.id.clone(), schema)?;
        Ok(self)
    }

    /// Add a service implementation.
    pub fn add_implementation(
        &mut self,
        implementation: ServiceImplementation,
    ) -> Result<&mut Self, DomainError> {
        check_range(
            "implementation",
            implementation.id.as_str(),
            implementation.difficulty,
        )?;
        if implementation.actions.len() != implementation.actors.len() {
            return Err(DomainError::ActorArity {
                id: implementation.id,
                actions: implementation.actions.len(),
                actors: implementation.actors.len(),
            });
        }
        insert_unique(
            &mut self.index.implementations,
            "implementation",
            implementation.id.clone(),
            implementation,
        )?;
        Ok(self)
    }

    /// Add a scenario template.
    pub fn add_template(&mut self, template: ScenarioTemplate) -> Result<&mut Self, DomainError> {
        insert_unique(
            &mut self.index.templates,
            "template",
            template.name.clone(),
            template,
        )?;
        Ok(self)
    }

    // -------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------

    /// Complete reverse links, validate references and derive providers.
    ///
    /// # Errors
    ///
    /// Returns the first [`DomainError::DanglingReference`],
    /// [`DomainError::ConflictingOwner`] or
    /// [`DomainError::ConflictingSchemaTask`] found.
    pub fn build(mut self) -> Result<DomainIndex, DomainError> {
        self.link_services()?;
        self.link_objects()?;
        self.tag_agents();
        self.link_implementations()?;
        self.link_schemas()?;
        self.validate_tasks()?;
        self.validate_templates()?;
        self.derive_providers();

        debug!(
            services = self.index.services.len(),
            objects = self.index.objects.len(),
            tasks = self.index.tasks.len(),
            schemas = self.index.schemas.len(),
            implementations = self.index.implementations.len(),
            "Domain index built"
        );
        Ok(self.index)
    }

    fn link_services(&mut self) -> Result<(), DomainError> {
        let services = &mut self.index.services;
        let mut parent_links: Vec<(ServiceId, ServiceId)> = Vec::new();
        for service in services.values() {
            if let Some(parent) = &service.parent {
                parent_links.push((parent.clone(), service.id.clone()));
            }
            for child in &service.children {
                parent_links.push((service.id.clone(), child.clone()));
            }
        }
        for (parent, child) in parent_links {
            if !services.contains_key(&child) {
                return Err(dangling("service", &parent, "service", &child));
            }
            let Some(parent_service) = services.get_mut(&parent) else {
                return Err(dangling("service", &child, "service", &parent));
            };
            push_unique(&mut parent_service.children, child.clone());
            if let Some(child_service) = services.get_mut(&child) {
                child_service.parent.get_or_insert(parent);
            }
        }
        Ok(())
    }

    fn link_objects(&mut self) -> Result<(), DomainError> {
        let objects = &mut self.index.objects;
        let mut links: Vec<(ObjectDescId, ObjectDescId)> = Vec::new();
        for object in objects.values() {
            for parent in &object.parents {
                links.push((parent.clone(), object.id.clone()));
            }
            for child in object.children() {
                links.push((object.id.clone(), child.clone()));
            }
            require_all(
                &self.index.implementations,
                &object.implementations,
                "object",
                &object.id,
                "implementation",
            )?;
            if let DescriptionShape::Concrete { setting_fit } = &object.shape {
                require_all(
                    &self.index.settings,
                    setting_fit.keys(),
                    "object",
                    &object.id,
                    "setting",
                )?;
            }
        }
        for (parent, child) in links {
            if !objects.contains_key(&parent) {
                return Err(dangling("object", &child, "object", &parent));
            }
            let Some(child_object) = objects.get_mut(&child) else {
                return Err(dangling("object", &parent, "object", &child));
            };
            push_unique(&mut child_object.parents, parent.clone());
            if let Some(parent_object) = objects.get_mut(&parent)
                && let DescriptionShape::Type { children } = &mut parent_object.shape
            {
                push_unique(children, child);
            }
        }
        Ok(())
    }

    fn tag_agents(&mut self) {
        for id in &self.agents {
            if self.index.agent_type_of(id).is_some() {
                continue;
            }
            if let Some(agent) = self.index.objects.get_mut(id) {
                debug!(agent = %id, "Untagged agent tagged with its own id");
                agent.agent_type = Some(AgentType::from(id.as_str()));
            }
        }
    }

    fn link_implementations(&mut self) -> Result<(), DomainError> {
        let mut constraint_pairs: Vec<(ImplementationId, ImplementationId)> = Vec::new();
        for implementation in self.index.implementations.values() {
            let id = &implementation.id;
            require_all(
                &self.index.services,
                [&implementation.service],
                "implementation",
                id,
                "service",
            )?;
            require_all(
                &self.index.tasks,
                &implementation.actions,
                "implementation",
                id,
                "task",
            )?;
            require_all(
                &self.index.implementations,
                &implementation.constraints,
                "implementation",
                id,
                "implementation",
            )?;
            let Some(owner) = self.index.objects.get_mut(&implementation.object) else {
                return Err(dangling(
                    "implementation",
                    id,
                    "object",
                    &implementation.object,
                ));
            };
            push_unique(&mut owner.implementations, id.clone());
            for constraint in &implementation.constraints {
                constraint_pairs.push((constraint.clone(), id.clone()));
            }
        }

        // Every offered implementation must name its offering object.
        for object in self.index.objects.values() {
            for offered in &object.implementations {
                if let Some(implementation) = self.index.implementations.get(offered)
                    && implementation.object != object.id
                {
                    return Err(DomainError::ConflictingOwner {
                        id: offered.clone(),
                        offered_by: object.id.clone(),
                        owner: implementation.object.clone(),
                    });
                }
            }
        }

        // Incompatibility is mutual.
        for (target, source) in constraint_pairs {
            if let Some(implementation) = self.index.implementations.get_mut(&target) {
                push_unique(&mut implementation.constraints, source);
            }
        }
        Ok(())
    }

    fn link_schemas(&mut self) -> Result<(), DomainError> {
        for schema in self.index.schemas.values() {
            let id = &schema.id;
            require_all(&self.index.tasks, &schema.subtasks, "schema", id, "task")?;
            require_all(
                &self.index.services,
                &schema.service_preconditions,
                "schema",
                id,
                "service",
            )?;
            require_all(
                &self.index.objects,
                &schema.object_preconditions,
                "schema",
                id,
                "object",
            )?;
            let Some(task) = self.index.tasks.get_mut(&schema.task) else {
                return Err(dangling("schema", id, "task", &schema.task));
            };
            push_unique(&mut task.decompositions, id.clone());
        }
        Ok(())
    }

    fn validate_tasks(&self) -> Result<(), DomainError> {
        for task in self.index.tasks.values() {
            require_all(
                &self.index.services,
                &task.required_services,
                "task",
                &task.id,
                "service",
            )?;
            for schema_id in &task.decompositions {
                let Some(schema) = self.index.schemas.get(schema_id) else {
                    return Err(dangling("task", &task.id, "schema", schema_id));
                };
                if schema.task != task.id {
                    return Err(DomainError::ConflictingSchemaTask {
                        id: schema_id.clone(),
                        task: schema.task.clone(),
                        listed_under: task.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_templates(&self) -> Result<(), DomainError> {
        for template in self.index.templates.values() {
            require_all(
                &self.index.tasks,
                &template.tasks,
                "template",
                &template.name,
                "task",
            )?;
        }
        Ok(())
    }

    /// Register each implementation under its service and every ancestor.
    fn derive_providers(&mut self) {
        let mut providers: BTreeMap<ServiceId, Vec<ImplementationId>> = BTreeMap::new();
        for implementation in self.index.implementations.values() {
            providers
                .entry(implementation.service.clone())
                .or_default()
                .push(implementation.id.clone());
            for ancestor in self.index.service_ancestors(&implementation.service) {
                providers
                    .entry(ancestor.clone())
                    .or_default()
                    .push(implementation.id.clone());
            }
        }
        self.index.providers = providers;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use drill_types::{ActorRequirement, AgentType, SchemaId, SettingFit, SettingId, TaskDescId};

    use super::*;

    fn service(id: &str, parent: Option<&str>) -> Service {
        Service {
            id: ServiceId::from(id),
            name: id.to_owned(),
            parent: parent.map(ServiceId::from),
            children: Vec::new(),
        }
    }

    fn lamp() -> ObjectDescription {
        ObjectDescription {
            id: ObjectDescId::from("lamp"),
            name: "Lamp".to_owned(),
            implementations: Vec::new(),
            parents: vec![ObjectDescId::from("light_source")],
            agent_type: None,
            shape: DescriptionShape::Concrete {
                setting_fit: BTreeMap::new(),
            },
        }
    }

    fn light_source() -> ObjectDescription {
        ObjectDescription {
            id: ObjectDescId::from("light_source"),
            name: "Light source".to_owned(),
            implementations: Vec::new(),
            parents: Vec::new(),
            agent_type: None,
            shape: DescriptionShape::Type {
                children: Vec::new(),
            },
        }
    }

    fn implementation(id: &str, constraints: &[&str]) -> ServiceImplementation {
        ServiceImplementation {
            id: ImplementationId::from(id),
            name: id.to_owned(),
            service: ServiceId::from("light"),
            object: ObjectDescId::from("lamp"),
            actions: Vec::new(),
            actors: Vec::new(),
            constraints: constraints.iter().map(|c| ImplementationId::from(*c)).collect(),
            difficulty: DifficultyRange::new(1, 2),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut builder = DomainBuilder::new();
        builder.add_service(service("light", None)).unwrap();
        let err = builder.add_service(service("light", None)).err();
        assert!(matches!(err, Some(DomainError::DuplicateId { kind: "service", .. })));
    }

    #[test]
    fn service_reverse_links_are_completed() {
        let mut builder = DomainBuilder::new();
        builder
            .add_service(service("light", None))
            .unwrap()
            .add_service(service("lamp_light", Some("light")))
            .unwrap();
        let index = builder.build().unwrap();
        let light = index.service(&ServiceId::from("light")).unwrap();
        assert_eq!(light.children, vec![ServiceId::from("lamp_light")]);
    }

    #[test]
    fn dangling_parent_service_is_rejected() {
        let mut builder = DomainBuilder::new();
        builder.add_service(service("lamp_light", Some("light"))).unwrap();
        let err = builder.build().err();
        assert!(matches!(err, Some(DomainError::DanglingReference { .. })));
    }

    #[test]
    fn type_children_are_completed_from_parents() {
        let mut builder = DomainBuilder::new();
        builder.add_object(light_source()).unwrap().add_object(lamp()).unwrap();
        let index = builder.build().unwrap();
        let source = index.object(&ObjectDescId::from("light_source")).unwrap();
        assert_eq!(source.children(), [ObjectDescId::from("lamp")]);
    }

    #[test]
    fn offers_are_completed_and_constraints_made_mutual() {
        let mut builder = DomainBuilder::new();
        builder
            .add_service(service("light", None))
            .unwrap()
            .add_object(light_source())
            .unwrap()
            .add_object(lamp())
            .unwrap()
            .add_implementation(implementation("dim", &["bright"]))
            .unwrap()
            .add_implementation(implementation("bright", &[]))
            .unwrap();
        let index = builder.build().unwrap();
        let lamp = index.object(&ObjectDescId::from("lamp")).unwrap();
        assert_eq!(lamp.implementations.len(), 2);
        let bright = index.implementation(&ImplementationId::from("bright")).unwrap();
        assert!(bright.conflicts_with(&ImplementationId::from("dim")));
        assert_eq!(index.providers_of(&ServiceId::from("light")).len(), 2);
    }

    #[test]
    fn actor_arity_is_checked() {
        let mut bad = implementation("dim", &[]);
        bad.actors.push(ActorRequirement::OfType(AgentType::from("person")));
        let err = DomainBuilder::new().add_implementation(bad).err();
        assert!(matches!(err, Some(DomainError::ActorArity { actions: 0, actors: 1, .. })));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut bad = implementation("dim", &[]);
        bad.difficulty = DifficultyRange::new(3, 1);
        let err = DomainBuilder::new().add_implementation(bad).err();
        assert!(matches!(err, Some(DomainError::InvertedDifficulty { .. })));
    }

    #[test]
    fn unknown_setting_in_fit_is_dangling() {
        let mut object = lamp();
        object.parents.clear();
        object.shape = DescriptionShape::Concrete {
            setting_fit: BTreeMap::from([(SettingId::from("moon"), SettingFit::Expected)]),
        };
        let mut builder = DomainBuilder::new();
        builder.add_object(object).unwrap();
        let err = builder.build().err();
        assert!(matches!(err, Some(DomainError::DanglingReference { target: "setting", .. })));
    }

    #[test]
    fn schema_listed_under_wrong_task_is_rejected() {
        let mut builder = DomainBuilder::new();
        for id in ["help", "other", "act"] {
            builder
                .add_task(TaskDescription {
                    id: TaskDescId::from(id),
                    name: id.to_owned(),
                    decompositions: if id == "other" {
                        vec![SchemaId::from("s1")]
                    } else {
                        Vec::new()
                    },
                    required_services: Vec::new(),
                })
                .unwrap();
        }
        builder
            .add_schema(DecompositionSchema {
                id: SchemaId::from("s1"),
                name: "S1".to_owned(),
                task: TaskDescId::from("help"),
                subtasks: vec![TaskDescId::from("act")],
                service_preconditions: Vec::new(),
                object_preconditions: Vec::new(),
                difficulty: DifficultyRange::new(1, 2),
            })
            .unwrap();
        let err = builder.build().err();
        assert!(matches!(err, Some(DomainError::ConflictingSchemaTask { .. })));
    }
}
