//! Service resolution.
//!
//! The [`ServiceResolver`] makes sure the scenario world offers a service.
//! It reuses an existing binding when there is one; otherwise it ranks the
//! implementations that could offer the service and tries them in order.
//! Trying an implementation means adding its precondition actions to the
//! story and enabling them, which recursively resolves further services,
//! then choosing or creating the serving object and the actors.
//!
//! Every candidate is tried on a snapshot of the timeline. A failed
//! candidate's snapshot is dropped; the first successful one is merged.

use std::collections::{BTreeMap, BTreeSet};

use drill_domain::DomainIndex;
use drill_types::{
    ActorRequirement, Difficulty, ImplementationId, InstanceIds, ObjectDescId, ObjectDescription,
    ObjectInstance, ObjectKind, ServiceId, ServiceImplementation, SettingFit, SettingId,
    TaskInstance,
};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::PlanError;
use crate::ranking::{implementation_score, rank_implementations, rank_stable};
use crate::timeline::Timeline;

/// Services mapped to the implementations that would offer them.
pub type ServiceBindings = BTreeMap<ServiceId, Vec<ImplementationId>>;

/// Difficulty and setting a scenario is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanParams {
    /// Requested difficulty.
    pub difficulty: Difficulty,
    /// Setting the scenario takes place in.
    pub setting: SettingId,
}

/// Resolves service requirements against a timeline.
///
/// Owns the generation context: the instance id allocator, the random
/// source and the stack of services currently being resolved.
#[derive(Debug)]
pub struct ServiceResolver<'d, R> {
    domain: &'d DomainIndex,
    params: PlanParams,
    ids: InstanceIds,
    rng: R,
    in_progress: Vec<ServiceId>,
}

impl<'d, R: Rng> ServiceResolver<'d, R> {
    /// Create a resolver.
    pub const fn new(domain: &'d DomainIndex, params: PlanParams, ids: InstanceIds, rng: R) -> Self {
        Self {
            domain,
            params,
            ids,
            rng,
            in_progress: Vec::new(),
        }
    }

    /// The domain being planned in.
    pub const fn domain(&self) -> &'d DomainIndex {
        self.domain
    }

    /// The requested difficulty and setting.
    pub const fn params(&self) -> &PlanParams {
        &self.params
    }

    /// The instance id allocator.
    pub const fn ids_mut(&mut self) -> &mut InstanceIds {
        &mut self.ids
    }

    /// The random source.
    pub const fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    // -------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------

    /// Make every service `action` requires available and record which
    /// object serves each. Atomic: on failure `timeline` is untouched.
    pub fn enable_action(
        &mut self,
        timeline: &mut Timeline<'d>,
        action: &TaskInstance,
    ) -> Result<(), PlanError> {
        let description = self.domain.task(&action.description)?;
        let mut snapshot = timeline.clone();
        let mut uses = Vec::with_capacity(description.required_services.len());
        for service in &description.required_services {
            match self.fill_service(&mut snapshot, service) {
                Ok(object) => uses.push((service.clone(), object.id)),
                Err(err) => {
                    debug!(
                        service = %service,
                        action = %description.id,
                        error = %err,
                        "Could not offer service for action"
                    );
                    return Err(err);
                }
            }
        }
        for (service, object) in uses {
            snapshot.add_action_existing_object(action.id, service, object);
        }
        timeline.merge(snapshot);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Services
    // -------------------------------------------------------------------

    /// Make sure `service` is offered and return the serving object.
    ///
    /// Idempotent: a service already bound (directly or through a
    /// descendant) returns the bound object without changes.
    pub fn fill_service(
        &mut self,
        timeline: &mut Timeline<'d>,
        service: &ServiceId,
    ) -> Result<ObjectInstance, PlanError> {
        if let Some(object) = timeline.is_service_offered(service) {
            return Ok(object.clone());
        }
        if self.in_progress.contains(service) {
            debug!(service = %service, "Service already being resolved");
            return Err(PlanError::UnresolvableService {
                service: service.clone(),
            });
        }
        self.in_progress.push(service.clone());
        let result = self.resolve_service(timeline, service);
        self.in_progress.pop();
        result
    }

    fn resolve_service(
        &mut self,
        timeline: &mut Timeline<'d>,
        service: &ServiceId,
    ) -> Result<ObjectInstance, PlanError> {
        for implementation in self.candidates(timeline, service) {
            let mut snapshot = timeline.clone();
            match self.try_implementation(&mut snapshot, service, implementation) {
                Ok(object) => {
                    debug!(
                        service = %service,
                        implementation = %implementation.id,
                        object = %object.description,
                        "Service filled"
                    );
                    timeline.merge(snapshot);
                    return Ok(object);
                }
                Err(err) => {
                    debug!(
                        service = %service,
                        implementation = %implementation.id,
                        error = %err,
                        "Candidate rejected"
                    );
                }
            }
        }
        Err(PlanError::UnresolvableService {
            service: service.clone(),
        })
    }

    /// Ranked candidates: implementations usable by an already present
    /// object first, then every provider of the service. Each group is
    /// narrowed to its zero-cost members when it has any.
    fn candidates(
        &mut self,
        timeline: &Timeline<'d>,
        service: &ServiceId,
    ) -> Vec<&'d ServiceImplementation> {
        let present = timeline
            .could_offer_service(service)
            .map(|(_, implementations)| implementations)
            .unwrap_or_default();
        let mut present = self.zero_cost_or_all(timeline, present);
        self.rank(&mut present);

        let seen: BTreeSet<&ImplementationId> = present.iter().map(|i| &i.id).collect();
        let providers: Vec<_> = self
            .domain
            .providers_of(service)
            .into_iter()
            .filter(|implementation| !seen.contains(&implementation.id))
            .collect();
        let mut providers = self.zero_cost_or_all(timeline, providers);
        self.rank(&mut providers);

        present.extend(providers);
        present
    }

    fn rank(&mut self, implementations: &mut Vec<&'d ServiceImplementation>) {
        rank_implementations(
            self.domain,
            implementations,
            self.params.difficulty,
            &self.params.setting,
            &mut self.rng,
        );
    }

    /// Implementations needing no new objects, or all of them if none do.
    fn zero_cost_or_all(
        &self,
        timeline: &Timeline<'d>,
        implementations: Vec<&'d ServiceImplementation>,
    ) -> Vec<&'d ServiceImplementation> {
        let free: Vec<_> = implementations
            .iter()
            .copied()
            .filter(|implementation| self.is_zero_cost(timeline, implementation))
            .collect();
        if free.is_empty() { implementations } else { free }
    }

    /// Whether every precondition action of `implementation` could be
    /// enabled with present capability only. Unconditional implementations
    /// are free.
    fn is_zero_cost(&self, timeline: &Timeline<'d>, implementation: &ServiceImplementation) -> bool {
        let mut stack = self.in_progress.clone();
        self.preconditions_offerable(timeline, implementation, &mut stack, &mut ServiceBindings::new())
    }

    fn preconditions_offerable(
        &self,
        timeline: &Timeline<'d>,
        implementation: &ServiceImplementation,
        stack: &mut Vec<ServiceId>,
        bindings: &mut ServiceBindings,
    ) -> bool {
        for action in &implementation.actions {
            let Ok(description) = self.domain.task(action) else {
                return false;
            };
            for required in &description.required_services {
                match self.offerable(timeline, required, stack) {
                    Some(found) => {
                        for (service, implementations) in found {
                            bindings.entry(service).or_default().extend(implementations);
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    /// Whether `service` could be offered using only objects already present.
    ///
    /// Never mutates or instantiates. Returns the service -> implementation
    /// bindings that would be used (empty when already offered), or `None`.
    pub fn could_service_be_offered(
        &self,
        timeline: &Timeline<'d>,
        service: &ServiceId,
    ) -> Option<ServiceBindings> {
        let mut stack = self.in_progress.clone();
        self.offerable(timeline, service, &mut stack)
    }

    fn offerable(
        &self,
        timeline: &Timeline<'d>,
        service: &ServiceId,
        stack: &mut Vec<ServiceId>,
    ) -> Option<ServiceBindings> {
        if timeline.is_service_offered(service).is_some() {
            return Some(ServiceBindings::new());
        }
        if stack.contains(service) {
            return None;
        }
        let (_, mut implementations) = timeline.could_offer_service(service)?;
        rank_stable(&mut implementations, |implementation| {
            implementation_score(
                self.domain,
                implementation,
                self.params.difficulty,
                &self.params.setting,
            )
        });

        stack.push(service.clone());
        let mut result = None;
        for implementation in implementations {
            let mut bindings = ServiceBindings::new();
            if self.preconditions_offerable(timeline, implementation, stack, &mut bindings) {
                bindings
                    .entry(service.clone())
                    .or_default()
                    .push(implementation.id.clone());
                result = Some(bindings);
                break;
            }
        }
        stack.pop();
        result
    }

    // -------------------------------------------------------------------
    // Candidates
    // -------------------------------------------------------------------

    fn try_implementation(
        &mut self,
        snapshot: &mut Timeline<'d>,
        service: &ServiceId,
        implementation: &'d ServiceImplementation,
    ) -> Result<ObjectInstance, PlanError> {
        // Precondition actions become story actions.
        let mut steps = Vec::with_capacity(implementation.actions.len());
        for (action, actor) in implementation.steps() {
            let instance =
                snapshot.add_story_action(action, implementation.service.clone(), &mut self.ids)?;
            self.enable_action(snapshot, &instance)?;
            steps.push((instance, actor));
        }

        // Serving object: a present, compatible instance or a new one.
        let present = self.select_present(snapshot, implementation)?;
        let is_new = present.is_none();
        let object = match present {
            Some(object) => object,
            None => self.instantiate(&implementation.object)?,
        };

        for (action, actor) in &steps {
            self.bind_actor(snapshot, action, actor, &object)?;
        }

        if is_new {
            snapshot.add_new_object(object.clone(), implementation.is_unconditional());
        }

        let difficulty = implementation.difficulty.matched(self.params.difficulty);
        let bound = if self.domain.is_service_child(service, &implementation.service) {
            implementation.service.clone()
        } else {
            service.clone()
        };
        snapshot.add_service_object(bound, implementation.id.clone(), object.id, difficulty);
        Ok(object)
    }

    /// A present instance of the implementation's description that can take
    /// it. `Ok(None)` when there is no instance at all.
    fn select_present(
        &mut self,
        snapshot: &Timeline<'d>,
        implementation: &ServiceImplementation,
    ) -> Result<Option<ObjectInstance>, PlanError> {
        let mut present = snapshot.contains_object_description(&implementation.object);
        if present.is_empty() {
            return Ok(None);
        }
        present.shuffle(&mut self.rng);
        present
            .into_iter()
            .find(|object| snapshot.satisfies_constraints(object.id, implementation))
            .cloned()
            .map(Some)
            .ok_or_else(|| PlanError::ConstraintsUnsatisfied {
                implementation: implementation.id.clone(),
            })
    }

    fn bind_actor(
        &mut self,
        snapshot: &mut Timeline<'d>,
        action: &TaskInstance,
        actor: &ActorRequirement,
        serving: &ObjectInstance,
    ) -> Result<(), PlanError> {
        match actor {
            ActorRequirement::Itself => {
                if serving.is_agent() {
                    snapshot.add_action_existing_actor(action.id, serving.id);
                }
            }
            ActorRequirement::OfType(agent_type) => {
                if let Some(agent) = snapshot.agent_by_type(agent_type) {
                    let agent = agent.id;
                    snapshot.add_action_existing_actor(action.id, agent);
                } else {
                    // TODO: distribute actions over every agent description of
                    // the type instead of always taking the first.
                    let description = self
                        .domain
                        .agents_of_type(agent_type)
                        .into_iter()
                        .next()
                        .ok_or_else(|| PlanError::NoAgentOfType {
                            agent_type: agent_type.clone(),
                        })?;
                    let agent = self.ids.object(description.id.clone(), ObjectKind::Agent);
                    snapshot.add_action_new_actor(action.id, agent);
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Objects
    // -------------------------------------------------------------------

    /// Create an instance of `description`, descending to the concrete
    /// description that best fits the setting.
    pub fn instantiate(&mut self, description: &ObjectDescId) -> Result<ObjectInstance, PlanError> {
        let concrete = self.find_best_object(description)?;
        let kind = if self.domain.is_agent(&concrete.id) {
            ObjectKind::Agent
        } else {
            ObjectKind::Object
        };
        Ok(self.ids.object(concrete.id.clone(), kind))
    }

    /// The concrete description at or below `description` that best fits
    /// the setting. Children are visited in random order and the first
    /// expected fit wins.
    pub fn find_best_object(
        &mut self,
        description: &ObjectDescId,
    ) -> Result<&'d ObjectDescription, PlanError> {
        let mut visited = BTreeSet::new();
        self.best_object_below(description, &mut visited)?
            .ok_or_else(|| PlanError::NoConcreteDescription {
                object: description.clone(),
            })
    }

    fn best_object_below(
        &mut self,
        description: &ObjectDescId,
        visited: &mut BTreeSet<ObjectDescId>,
    ) -> Result<Option<&'d ObjectDescription>, PlanError> {
        if !visited.insert(description.clone()) {
            return Ok(None);
        }
        let object = self.domain.object(description)?;
        if object.is_concrete() {
            return Ok(Some(object));
        }
        let mut children: Vec<&'d ObjectDescId> = object.children().iter().collect();
        children.shuffle(&mut self.rng);

        let mut best: Option<(SettingFit, &'d ObjectDescription)> = None;
        for child in children {
            let Some(candidate) = self.best_object_below(child, visited)? else {
                continue;
            };
            let fit = candidate
                .setting_fit(&self.params.setting)
                .unwrap_or_default();
            if best.is_none_or(|(best_fit, _)| fit > best_fit) {
                best = Some((fit, candidate));
                if fit == SettingFit::BEST {
                    break;
                }
            }
        }
        Ok(best.map(|(_, object)| object))
    }
}
