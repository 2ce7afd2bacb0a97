//! Run sampling and report rendering.
//!
//! Every request is generated several times with consecutive seeds. One of
//! the successful runs is picked at random and described in the report;
//! failed runs are listed with their classified reason.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use drill_domain::DomainIndex;
use drill_planner::{
    GeneratedScenario, GenerationConfig, OutputFormat, ScenarioGenerator, ScenarioRequest,
    ServiceBinding,
};
use drill_types::{ObjectInstance, TaskInstance};
use minijinja::Environment;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CliError;

/// Built-in plain-text report layout.
const TEXT_TEMPLATE: &str = include_str!("../templates/report.j2");

/// Everything generated in one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Domain file the scenarios were generated from.
    pub domain: String,
    /// Base seed of the runs.
    pub seed: u64,
    /// One entry per configured request.
    pub scenarios: Vec<ScenarioReport>,
}

/// Outcome of all runs of one request.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// The request.
    pub request: ScenarioRequest,
    /// Runs attempted.
    pub runs: u32,
    /// Runs that produced a scenario.
    pub successes: usize,
    /// The successful run picked for the report, if any.
    pub selected: Option<SelectedRun>,
    /// Runs that failed.
    pub failures: Vec<RunFailure>,
}

/// A successful run flattened for output.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedRun {
    /// Seed of the run.
    pub seed: u64,
    /// Schemas forced from the template to the trained task.
    pub critical_path: Vec<String>,
    /// Trainee tasks in execution order.
    pub planning: Vec<String>,
    /// Story actions, latest first.
    pub story: Vec<String>,
    /// Objects in place before the scenario starts.
    pub init_objects: Vec<String>,
    /// Objects introduced during the scenario.
    pub dynamic_objects: Vec<String>,
    /// Service bindings by service id.
    pub services: BTreeMap<String, ServiceBinding>,
    /// Rendered scenario.
    pub text: String,
}

/// A failed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    /// Seed of the run.
    pub seed: u64,
    /// Failure classification.
    pub kind: &'static str,
    /// Error message.
    pub message: String,
}

impl ScenarioReport {
    /// Run `request` `runs_per_request` times and pick one success.
    pub fn collect(
        generator: &ScenarioGenerator<'_>,
        request: &ScenarioRequest,
        generation: &GenerationConfig,
    ) -> Self {
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for run in 0..generation.runs_per_request {
            let seed = generation.seed.wrapping_add(u64::from(run));
            match generator.generate(request, StdRng::seed_from_u64(seed)) {
                Ok(scenario) => {
                    debug!(seed, target = %request.target, "Run succeeded");
                    successes.push((seed, scenario));
                }
                Err(err) => {
                    warn!(
                        seed,
                        template = %request.template,
                        target = %request.target,
                        kind = err.kind(),
                        error = %err,
                        "Run failed"
                    );
                    failures.push(RunFailure {
                        seed,
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let mut picker = StdRng::seed_from_u64(generation.seed);
        let selected = successes
            .choose(&mut picker)
            .map(|(seed, scenario)| SelectedRun::from_scenario(*seed, scenario));
        Self {
            request: request.clone(),
            runs: generation.runs_per_request,
            successes: successes.len(),
            selected,
            failures,
        }
    }
}

impl SelectedRun {
    /// Flatten a generated scenario.
    pub fn from_scenario(seed: u64, scenario: &GeneratedScenario<'_>) -> Self {
        let timeline = &scenario.timeline;
        let domain = timeline.domain();
        Self {
            seed,
            critical_path: scenario
                .critical_path
                .iter()
                .map(|schema| schema.as_str().to_owned())
                .collect(),
            planning: timeline
                .planning()
                .iter()
                .map(|task| task_name(domain, task))
                .collect(),
            story: timeline
                .story()
                .iter()
                .rev()
                .map(|task| task_name(domain, task))
                .collect(),
            init_objects: timeline
                .init_objects()
                .iter()
                .map(|object| object_label(domain, object))
                .collect(),
            dynamic_objects: timeline
                .dynamic_objects()
                .iter()
                .map(|object| object_label(domain, object))
                .collect(),
            services: timeline
                .service_bindings()
                .iter()
                .map(|(service, binding)| (service.as_str().to_owned(), binding.clone()))
                .collect(),
            text: scenario.render(),
        }
    }
}

fn task_name(domain: &DomainIndex, task: &TaskInstance) -> String {
    domain
        .task(&task.description)
        .map_or_else(|_| task.description.as_str().to_owned(), |t| t.name.clone())
}

fn object_label(domain: &DomainIndex, object: &ObjectInstance) -> String {
    let name = domain
        .object(&object.description)
        .map_or(object.description.as_str(), |d| d.name.as_str());
    format!("{name}({})", object.id)
}

/// Render the report in the configured format.
pub fn render(report: &Report, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_text(report: &Report) -> Result<String, CliError> {
    let mut env = Environment::new();
    env.add_template("report", TEXT_TEMPLATE)
        .map_err(|e| CliError::Template(format!("failed to add report template: {e}")))?;
    env.get_template("report")
        .map_err(|e| CliError::Template(format!("missing report template: {e}")))?
        .render(report)
        .map_err(|e| CliError::Template(format!("report render failed: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn first_aid() -> DomainIndex {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../domains/first_aid.yaml");
        DomainIndex::from_file(&path).unwrap()
    }

    fn generation(runs: u32) -> GenerationConfig {
        GenerationConfig {
            seed: 7,
            runs_per_request: runs,
        }
    }

    fn request(target: &str) -> ScenarioRequest {
        ScenarioRequest {
            template: "basic".into(),
            target: target.into(),
            difficulty: 2,
            setting: "park".into(),
        }
    }

    fn report(scenarios: Vec<ScenarioReport>) -> Report {
        Report {
            generated_at: Utc::now(),
            domain: "first_aid.yaml".into(),
            seed: 7,
            scenarios,
        }
    }

    #[test]
    fn successful_runs_select_one_scenario() {
        let index = first_aid();
        let generator = ScenarioGenerator::new(&index);
        let outcome =
            ScenarioReport::collect(&generator, &request("Cool burn with water"), &generation(4));
        assert_eq!(outcome.runs, 4);
        assert_eq!(outcome.successes, 4);
        assert!(outcome.failures.is_empty());
        let selected = outcome.selected.unwrap();
        assert!((7..11).contains(&selected.seed));
        assert!(selected.planning.contains(&"Cool burn with water".to_owned()));
        assert_eq!(selected.critical_path, vec!["help_burn", "cool_water"]);
    }

    #[test]
    fn failed_runs_are_listed() {
        let index = first_aid();
        let generator = ScenarioGenerator::new(&index);
        let outcome = ScenarioReport::collect(&generator, &request("Juggle"), &generation(3));
        assert_eq!(outcome.successes, 0);
        assert!(outcome.selected.is_none());
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures.iter().all(|f| f.kind == "unknown_task"));

        let text = render(&report(vec![outcome]), OutputFormat::Text).unwrap();
        assert!(text.contains("0 of 3 runs succeeded"));
        assert!(text.contains("No scenario could be generated"));
        assert!(text.contains("seed 8: unknown_task"));
    }

    #[test]
    fn text_report_embeds_rendered_scenario() {
        let index = first_aid();
        let generator = ScenarioGenerator::new(&index);
        let outcome =
            ScenarioReport::collect(&generator, &request("Cool burn with water"), &generation(2));
        let text = render(&report(vec![outcome]), OutputFormat::Text).unwrap();
        assert!(text.starts_with("Drill training scenarios\n"));
        assert!(text.contains("Critical path: help_burn > cool_water"));
        assert!(text.contains("Task to train: Cool burn with water"));
    }

    #[test]
    fn json_report_is_structured() {
        let index = first_aid();
        let generator = ScenarioGenerator::new(&index);
        let outcome =
            ScenarioReport::collect(&generator, &request("Cool burn with water"), &generation(1));
        let json = render(&report(vec![outcome]), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let scenario = &value["scenarios"][0];
        assert_eq!(scenario["request"]["target"], "Cool burn with water");
        assert_eq!(scenario["selected"]["services"]["running_water"]["difficulty"], 2);
    }
}
