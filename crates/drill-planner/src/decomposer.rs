//! Task decomposition.
//!
//! The [`TaskDecomposer`] turns composite planning tasks into atomic ones by
//! applying decomposition schemas, best-ranked first. Each schema attempt
//! runs on a snapshot, so a schema whose preconditions or subtasks cannot be
//! satisfied is abandoned without trace and the next one is tried.
//!
//! [`TaskDecomposer::decompose_task_fixed`] forces a given chain of schemas
//! from a top-level task down to the task being trained.

use drill_types::{DecompositionSchema, TaskInstance};
use rand::Rng;
use tracing::debug;

use crate::error::PlanError;
use crate::ranking::rank_schemas;
use crate::resolver::ServiceResolver;
use crate::timeline::Timeline;

/// Which schemas a decomposition may choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPolicy {
    /// Any schema whose preconditions can be enabled, adding objects as
    /// needed.
    Free,
    /// Only schemas whose preconditions already hold or are satisfiable
    /// with the objects present.
    ZeroCost,
}

/// Decomposes planning tasks against a timeline.
#[derive(Debug)]
pub struct TaskDecomposer<'d, R> {
    resolver: ServiceResolver<'d, R>,
}

impl<'d, R: Rng> TaskDecomposer<'d, R> {
    /// Create a decomposer resolving services with `resolver`.
    pub const fn new(resolver: ServiceResolver<'d, R>) -> Self {
        Self { resolver }
    }

    /// The service resolver.
    pub const fn resolver_mut(&mut self) -> &mut ServiceResolver<'d, R> {
        &mut self.resolver
    }

    /// Expand one planning task: enable it if atomic, decompose it under
    /// `policy` otherwise.
    pub fn expand(
        &mut self,
        timeline: &mut Timeline<'d>,
        task: &TaskInstance,
        policy: SchemaPolicy,
    ) -> Result<(), PlanError> {
        if task.is_atomic() {
            self.resolver.enable_action(timeline, task)
        } else {
            self.decompose_task(timeline, task, policy)
        }
    }

    /// Expand the siblings of a critical task without adding new objects
    /// where possible: left siblings nearest first, then right siblings.
    pub fn expand_siblings(
        &mut self,
        timeline: &mut Timeline<'d>,
        left: &[TaskInstance],
        right: &[TaskInstance],
    ) -> Result<(), PlanError> {
        for sibling in left.iter().rev().chain(right) {
            self.expand(timeline, sibling, SchemaPolicy::ZeroCost)?;
        }
        Ok(())
    }

    /// Decompose composite `task` with the best applicable schema and
    /// recursively expand its subtasks.
    ///
    /// Atomic: on failure `timeline` is untouched.
    pub fn decompose_task(
        &mut self,
        timeline: &mut Timeline<'d>,
        task: &TaskInstance,
        policy: SchemaPolicy,
    ) -> Result<(), PlanError> {
        let domain = self.resolver.domain();
        let mut schemas = domain.schemas_for(&task.description)?;
        if schemas.is_empty() {
            return Err(PlanError::NoDecomposition {
                task: task.description.clone(),
            });
        }
        let difficulty = self.resolver.params().difficulty;
        rank_schemas(&mut schemas, difficulty, self.resolver.rng_mut());

        for schema in schemas {
            if policy == SchemaPolicy::ZeroCost && !self.hold_preconditions(timeline, schema) {
                continue;
            }
            let mut snapshot = timeline.clone();
            match self.apply_schema(&mut snapshot, task, schema, policy) {
                Ok(()) => {
                    debug!(
                        task = %task.description,
                        schema = %schema.id,
                        ?policy,
                        "Schema chosen"
                    );
                    timeline.merge(snapshot);
                    return Ok(());
                }
                Err(err) => {
                    debug!(
                        task = %task.description,
                        schema = %schema.id,
                        error = %err,
                        "Schema abandoned"
                    );
                }
            }
        }
        Err(PlanError::NoApplicableSchema {
            task: task.description.clone(),
        })
    }

    fn apply_schema(
        &mut self,
        snapshot: &mut Timeline<'d>,
        task: &TaskInstance,
        schema: &DecompositionSchema,
        policy: SchemaPolicy,
    ) -> Result<(), PlanError> {
        self.enable_preconditions(snapshot, schema)?;
        let subtasks = snapshot
            .decompose_task(task.id, schema, self.resolver.ids_mut())?
            .ok_or(PlanError::TaskNotPlanned { task: task.id })?;
        for subtask in &subtasks {
            self.expand(snapshot, subtask, policy)?;
        }
        Ok(())
    }

    /// Force `chain` onto `task`: the head schema decomposes `task`, the
    /// subtask the next schema applies to recurses along the rest of the
    /// chain and its siblings are expanded at zero cost. Once the chain is
    /// exhausted the remaining subtasks are expanded freely.
    pub fn decompose_task_fixed(
        &mut self,
        timeline: &mut Timeline<'d>,
        task: &TaskInstance,
        chain: &[&'d DecompositionSchema],
    ) -> Result<(), PlanError> {
        let Some((schema, rest)) = chain.split_first() else {
            return self.expand(timeline, task, SchemaPolicy::Free);
        };
        if schema.task != task.description {
            return Err(PlanError::SchemaMismatch {
                schema: schema.id.clone(),
                task: task.description.clone(),
            });
        }

        let mut snapshot = timeline.clone();
        self.enable_preconditions(&mut snapshot, schema)?;
        let subtasks = snapshot
            .decompose_task(task.id, schema, self.resolver.ids_mut())?
            .ok_or(PlanError::TaskNotPlanned { task: task.id })?;
        debug!(task = %task.description, schema = %schema.id, "Schema forced");

        match rest.first() {
            None => {
                for subtask in &subtasks {
                    self.expand(&mut snapshot, subtask, SchemaPolicy::Free)?;
                }
            }
            Some(next) => {
                let split = subtasks
                    .iter()
                    .position(|subtask| subtask.description == next.task)
                    .and_then(|position| subtasks.split_at_checked(position))
                    .and_then(|(left, tail)| tail.split_first().map(|(c, right)| (left, c, right)));
                let Some((left, critical, right)) = split else {
                    return Err(PlanError::SchemaMismatch {
                        schema: next.id.clone(),
                        task: next.task.clone(),
                    });
                };
                self.decompose_task_fixed(&mut snapshot, critical, rest)?;
                self.expand_siblings(&mut snapshot, left, right)?;
            }
        }
        timeline.merge(snapshot);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Preconditions
    // -------------------------------------------------------------------

    /// Fill the schema's service preconditions and place any missing object
    /// preconditions as dynamic objects.
    fn enable_preconditions(
        &mut self,
        snapshot: &mut Timeline<'d>,
        schema: &DecompositionSchema,
    ) -> Result<(), PlanError> {
        for service in &schema.service_preconditions {
            self.resolver.fill_service(snapshot, service)?;
        }
        for object in &schema.object_preconditions {
            if snapshot.contains_object_description(object).is_empty() {
                let instance = self.resolver.instantiate(object)?;
                snapshot.add_new_object(instance, false);
            }
        }
        Ok(())
    }

    /// Whether the schema's preconditions hold with present objects only.
    fn hold_preconditions(&self, timeline: &Timeline<'d>, schema: &DecompositionSchema) -> bool {
        schema
            .service_preconditions
            .iter()
            .all(|service| self.resolver.could_service_be_offered(timeline, service).is_some())
            && schema
                .object_preconditions
                .iter()
                .all(|object| !timeline.contains_object_description(object).is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use drill_types::{Difficulty, InstanceIds, SchemaId, SettingId, TaskDescId};
    use rand::rngs::SmallRng;

    use super::*;
    use crate::resolver::PlanParams;
    use crate::test_support::{domain, lamp_domain, rng};

    fn decomposer(
        index: &drill_domain::DomainIndex,
        difficulty: Difficulty,
        seed: u64,
    ) -> TaskDecomposer<'_, SmallRng> {
        let params = PlanParams {
            difficulty,
            setting: SettingId::from("home"),
        };
        TaskDecomposer::new(ServiceResolver::new(index, params, InstanceIds::new(), rng(seed)))
    }

    fn plan<'d>(
        timeline: &mut Timeline<'d>,
        decomposer: &mut TaskDecomposer<'d, SmallRng>,
        tasks: &[&str],
    ) -> Vec<TaskInstance> {
        let tasks: Vec<_> = tasks.iter().map(|t| TaskDescId::from(*t)).collect();
        timeline
            .add_template(&tasks, decomposer.resolver_mut().ids_mut())
            .unwrap()
    }

    fn planning(timeline: &Timeline<'_>) -> Vec<String> {
        timeline
            .planning()
            .iter()
            .map(|t| t.description.as_str().to_owned())
            .collect()
    }

    /// `wash` has an easy and a hard schema; `rinse` needs running water.
    const KITCHEN: &str = r"
services: [{ id: water }, { id: soap }]
settings: [{ id: home }]
objects:
  - { id: sink, kind: object, offers: [sink_water] }
  - { id: bottle, kind: object, offers: [bottle_soap] }
  - { id: sponge, kind: object }
tasks:
  - { id: wash }
  - { id: scrub }
  - { id: rinse, requires: [water] }
  - { id: soak, requires: [water] }
  - { id: lather, requires: [soap] }
  - { id: dry }
  - { id: tidy }
  - { id: fold }
schemas:
  - { id: s1, task: wash, subtasks: [rinse], min_difficulty: 1, max_difficulty: 2 }
  - { id: s2, task: wash, subtasks: [scrub, rinse], min_difficulty: 3, max_difficulty: 4 }
  - { id: scrub_soap, task: scrub, subtasks: [lather], object_preconditions: [sponge], min_difficulty: 1, max_difficulty: 5 }
  - { id: tidy_up, task: tidy, subtasks: [dry, fold], min_difficulty: 1, max_difficulty: 4 }
  - { id: tidy_wet, task: tidy, subtasks: [soak], service_preconditions: [water], min_difficulty: 5, max_difficulty: 5 }
implementations:
  - { id: sink_water, service: water, object: sink, min_difficulty: 1, max_difficulty: 5 }
  - { id: bottle_soap, service: soap, object: bottle, min_difficulty: 1, max_difficulty: 5 }
templates:
  - { name: chores, tasks: [tidy, wash] }
";

    #[test]
    fn closest_schema_is_selected() {
        let index = domain(KITCHEN);
        for seed in 0..10 {
            let mut decomposer = decomposer(&index, 3, seed);
            let mut timeline = Timeline::new(&index);
            let planned = plan(&mut timeline, &mut decomposer, &["wash"]);
            decomposer
                .decompose_task(&mut timeline, planned.first().unwrap(), SchemaPolicy::Free)
                .unwrap();
            assert_eq!(planning(&timeline), vec!["lather", "rinse"]);
            // The sponge precondition is placed dynamically.
            assert!(
                timeline
                    .dynamic_objects()
                    .iter()
                    .any(|o| o.description.as_str() == "sponge")
            );
        }
    }

    #[test]
    fn decomposition_yields_atomic_planning() {
        let index = domain(KITCHEN);
        let mut decomposer = decomposer(&index, 1, 3);
        let mut timeline = Timeline::new(&index);
        let planned = plan(&mut timeline, &mut decomposer, &["tidy", "wash"]);
        for task in &planned {
            decomposer
                .decompose_task(&mut timeline, task, SchemaPolicy::Free)
                .unwrap();
        }
        assert!(timeline.planning().iter().all(TaskInstance::is_atomic));
        assert_eq!(planning(&timeline), vec!["dry", "fold", "rinse"]);
        let rinse = timeline.planning().last().unwrap();
        assert_eq!(timeline.action_uses(rinse.id).len(), 1);
    }

    #[test]
    fn zero_cost_policy_skips_schemas_needing_new_objects() {
        let index = domain(KITCHEN);
        for seed in 0..10 {
            let mut decomposer = decomposer(&index, 5, seed);
            let mut timeline = Timeline::new(&index);
            let planned = plan(&mut timeline, &mut decomposer, &["tidy"]);
            decomposer
                .decompose_task(&mut timeline, planned.first().unwrap(), SchemaPolicy::ZeroCost)
                .unwrap();
            // tidy_wet fits level 5 best but would need a sink.
            assert_eq!(planning(&timeline), vec!["dry", "fold"]);
            assert_eq!(timeline.objects().count(), 0);
        }
    }

    #[test]
    fn free_policy_takes_best_ranked_schema() {
        let index = domain(KITCHEN);
        let mut decomposer = decomposer(&index, 5, 0);
        let mut timeline = Timeline::new(&index);
        let planned = plan(&mut timeline, &mut decomposer, &["tidy"]);
        decomposer
            .decompose_task(&mut timeline, planned.first().unwrap(), SchemaPolicy::Free)
            .unwrap();
        assert_eq!(planning(&timeline), vec!["soak"]);
    }

    #[test]
    fn atomic_task_has_no_decomposition() {
        let index = domain(KITCHEN);
        let mut decomposer = decomposer(&index, 1, 0);
        let mut timeline = Timeline::new(&index);
        let planned = plan(&mut timeline, &mut decomposer, &["dry"]);
        let err = decomposer
            .decompose_task(&mut timeline, planned.first().unwrap(), SchemaPolicy::Free)
            .unwrap_err();
        assert!(matches!(err, PlanError::NoDecomposition { .. }));
    }

    #[test]
    fn failing_subtasks_fall_back_to_next_schema() {
        let yaml = r"
services: [{ id: power }]
settings: [{ id: home }]
tasks:
  - { id: light_room }
  - { id: switch_on, requires: [power] }
  - { id: open_curtains }
schemas:
  - { id: by_switch, task: light_room, subtasks: [switch_on], min_difficulty: 1, max_difficulty: 1 }
  - { id: by_curtains, task: light_room, subtasks: [open_curtains], min_difficulty: 3, max_difficulty: 3 }
";
        let index = domain(yaml);
        let mut decomposer = decomposer(&index, 1, 0);
        let mut timeline = Timeline::new(&index);
        let planned = plan(&mut timeline, &mut decomposer, &["light_room"]);
        decomposer
            .decompose_task(&mut timeline, planned.first().unwrap(), SchemaPolicy::Free)
            .unwrap();
        assert_eq!(planning(&timeline), vec!["open_curtains"]);
    }

    #[test]
    fn fixed_chain_mismatch_is_rejected() {
        let index = lamp_domain();
        let mut decomposer = decomposer(&index, 2, 0);
        let mut timeline = Timeline::new(&index);
        let planned = plan(&mut timeline, &mut decomposer, &["enter"]);
        let schema = index.schema(&SchemaId::from("light_by_switch")).unwrap();
        let err = decomposer
            .decompose_task_fixed(&mut timeline, planned.first().unwrap(), &[schema])
            .unwrap_err();
        assert!(matches!(err, PlanError::SchemaMismatch { .. }));
        assert_eq!(planning(&timeline), vec!["enter"]);
    }

    #[test]
    fn fixed_chain_forces_schema() {
        let index = domain(KITCHEN);
        let mut decomposer = decomposer(&index, 1, 0);
        let mut timeline = Timeline::new(&index);
        let planned = plan(&mut timeline, &mut decomposer, &["wash"]);
        // s2 is forced although s1 fits level 1 better.
        let chain = [
            index.schema(&SchemaId::from("s2")).unwrap(),
            index.schema(&SchemaId::from("scrub_soap")).unwrap(),
        ];
        decomposer
            .decompose_task_fixed(&mut timeline, planned.first().unwrap(), &chain)
            .unwrap();
        assert_eq!(planning(&timeline), vec!["lather", "rinse"]);
        assert!(timeline.planning().iter().all(TaskInstance::is_atomic));
    }
}
