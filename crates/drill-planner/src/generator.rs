//! Scenario generation.
//!
//! A [`ScenarioRequest`] names a template, the task to train, a difficulty
//! and a setting. The [`ScenarioGenerator`] lays out the template's tasks,
//! forces the chain of schemas that leads to the trained task through the
//! template task it descends from, then expands the remaining template
//! tasks at the lowest cost it can find.

use std::fmt;

use drill_domain::DomainIndex;
use drill_types::{Difficulty, InstanceIds, SchemaId, TaskDescId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::critical_path;
use crate::decomposer::{SchemaPolicy, TaskDecomposer};
use crate::error::GenerateError;
use crate::resolver::{PlanParams, ServiceResolver};
use crate::timeline::Timeline;

/// One scenario to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    /// Template name.
    pub template: String,
    /// Name (or id) of the task to train.
    pub target: String,
    /// Requested difficulty.
    pub difficulty: Difficulty,
    /// Name (or id) of the setting.
    pub setting: String,
}

/// A generated scenario.
#[derive(Debug, Clone)]
pub struct GeneratedScenario<'d> {
    /// The request this scenario answers.
    pub request: ScenarioRequest,
    /// Display name of the resolved target task.
    pub target_name: String,
    /// Display name of the resolved setting.
    pub setting_name: String,
    /// Schemas forced from the template down to the target, root first.
    pub critical_path: Vec<SchemaId>,
    /// The scenario itself.
    pub timeline: Timeline<'d>,
}

impl GeneratedScenario<'_> {
    /// Human-readable scenario description.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Task ids of the planning sequence in execution order.
    pub fn planning_ids(&self) -> Vec<&TaskDescId> {
        self.timeline
            .planning()
            .iter()
            .map(|task| &task.description)
            .collect()
    }
}

impl fmt::Display for GeneratedScenario<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Task to train: {}", self.target_name)?;
        writeln!(f, "Setting: {}", self.setting_name)?;
        writeln!(f, "Difficulty: {}", self.request.difficulty)?;
        writeln!(f)?;
        write!(f, "{}", self.timeline)
    }
}

/// Generates scenarios over a domain.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioGenerator<'d> {
    domain: &'d DomainIndex,
}

impl<'d> ScenarioGenerator<'d> {
    /// Create a generator over `domain`.
    pub const fn new(domain: &'d DomainIndex) -> Self {
        Self { domain }
    }

    /// Generate one scenario for `request`, drawing choices from `rng`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerateError`] naming the template, task or setting that
    /// could not be resolved, or why planning failed after every
    /// alternative was exhausted.
    pub fn generate<R: Rng>(
        &self,
        request: &ScenarioRequest,
        mut rng: R,
    ) -> Result<GeneratedScenario<'d>, GenerateError> {
        let domain = self.domain;
        let template = domain
            .template(&request.template)
            .ok_or_else(|| GenerateError::UnknownTemplate(request.template.clone()))?;
        let target = domain
            .task_id_by_name(&request.target)
            .ok_or_else(|| GenerateError::UnknownTask(request.target.clone()))?;
        let setting = domain
            .setting_by_name(&request.setting)
            .ok_or_else(|| GenerateError::UnknownSetting(request.setting.clone()))?;

        let chain = critical_path::locate(domain, template, target, request.difficulty, &mut rng)?;
        let critical_task = chain.first().map_or(target, |&schema| &schema.task);

        let params = PlanParams {
            difficulty: request.difficulty,
            setting: setting.id.clone(),
        };
        let mut decomposer =
            TaskDecomposer::new(ServiceResolver::new(domain, params, InstanceIds::new(), rng));
        let mut timeline = Timeline::new(domain);
        let planned = timeline.add_template(&template.tasks, decomposer.resolver_mut().ids_mut())?;

        let split = planned
            .iter()
            .position(|task| &task.description == critical_task)
            .and_then(|position| planned.split_at_checked(position))
            .and_then(|(left, tail)| tail.split_first().map(|(c, right)| (left, c, right)));
        let Some((left, critical, right)) = split else {
            return Err(GenerateError::CriticalPathNotFound {
                template: template.name.clone(),
                target: target.clone(),
            });
        };

        if chain.is_empty() {
            decomposer.expand(&mut timeline, critical, SchemaPolicy::Free)?;
        } else {
            decomposer.decompose_task_fixed(&mut timeline, critical, &chain)?;
        }
        decomposer.expand_siblings(&mut timeline, left, right)?;

        let target_name = domain.task(target)?.name.clone();
        info!(
            template = %template.name,
            target = %target,
            setting = %setting.id,
            difficulty = request.difficulty,
            planning = timeline.planning().len(),
            story = timeline.story().len(),
            objects = timeline.objects().count(),
            "Scenario generated"
        );
        Ok(GeneratedScenario {
            request: request.clone(),
            target_name,
            setting_name: setting.name.clone(),
            critical_path: chain.iter().map(|schema| schema.id.clone()).collect(),
            timeline,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{lamp_domain, rng};

    fn request(target: &str, difficulty: Difficulty) -> ScenarioRequest {
        ScenarioRequest {
            template: "evening".into(),
            target: target.into(),
            difficulty,
            setting: "Home".into(),
        }
    }

    #[test]
    fn lamp_scenario_lights_room_with_one_lamp() {
        let index = lamp_domain();
        let generator = ScenarioGenerator::new(&index);
        for seed in 0..10 {
            let scenario = generator.generate(&request("switch on", 2), rng(seed)).unwrap();
            let timeline = &scenario.timeline;

            let lamps: Vec<_> = timeline
                .objects()
                .filter(|o| o.description.as_str() == "lamp")
                .collect();
            assert_eq!(lamps.len(), 1);
            assert!(timeline.init_objects().iter().any(|o| o.description.as_str() == "lamp"));

            let binding = timeline.service_bindings().get("light").unwrap();
            assert_eq!(binding.difficulty, 2);
            assert_eq!(scenario.critical_path, vec![SchemaId::from("light_by_switch")]);
            assert!(timeline.planning().iter().all(|t| t.is_atomic()));
            assert_eq!(
                scenario
                    .planning_ids()
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>(),
                vec!["enter", "walk_to_switch", "switch_on", "leave"]
            );
        }
    }

    #[test]
    fn unknown_names_are_classified() {
        let index = lamp_domain();
        let generator = ScenarioGenerator::new(&index);

        let mut bad_template = request("switch on", 2);
        bad_template.template = "morning".into();
        let err = generator.generate(&bad_template, rng(0)).unwrap_err();
        assert_eq!(err.kind(), "unknown_template");

        let err = generator.generate(&request("dance", 2), rng(0)).unwrap_err();
        assert_eq!(err.kind(), "unknown_task");

        let mut bad_setting = request("switch on", 2);
        bad_setting.setting = "moon".into();
        let err = generator.generate(&bad_setting, rng(0)).unwrap_err();
        assert_eq!(err.kind(), "unknown_setting");
    }

    #[test]
    fn unreachable_target_fails_request() {
        let index = lamp_domain();
        let generator = ScenarioGenerator::new(&index);
        let err = generator.generate(&request("wire switch", 2), rng(0)).unwrap_err();
        assert!(matches!(err, GenerateError::CriticalPathNotFound { .. }));
    }

    #[test]
    fn render_starts_with_trained_task() {
        let index = lamp_domain();
        let generator = ScenarioGenerator::new(&index);
        let scenario = generator.generate(&request("Light room", 2), rng(3)).unwrap();
        let text = scenario.render();
        assert!(text.starts_with("Task to train: Light room\nSetting: Home\n"));
        assert!(text.contains("Lamp(") && text.contains("offers Light at level 2"));
    }
}
