//! Critical path location.
//!
//! Finds a chain of decomposition schemas leading from one of a template's
//! top-level tasks down to the task being trained. The search expands the
//! task hierarchy breadth-first from the template, recording which schemas
//! produce each subtask, and stops at the first level where the target
//! appears. It then walks back from the target, picking the best-ranked
//! producing schema at every step, until it reaches a top-level task.

use std::collections::{BTreeMap, BTreeSet};

use drill_domain::DomainIndex;
use drill_types::{DecompositionSchema, Difficulty, ScenarioTemplate, TaskDescId};
use rand::Rng;
use tracing::debug;

use crate::error::GenerateError;
use crate::ranking::rank_schemas;

/// Schemas from a template task down to `target`, root first.
///
/// Empty when `target` is itself a top-level task of the template.
///
/// # Errors
///
/// Returns [`GenerateError::CriticalPathNotFound`] when no schema chain
/// connects the template to `target`.
pub fn locate<'d>(
    domain: &'d DomainIndex,
    template: &'d ScenarioTemplate,
    target: &TaskDescId,
    difficulty: Difficulty,
    rng: &mut impl Rng,
) -> Result<Vec<&'d DecompositionSchema>, GenerateError> {
    let not_found = || GenerateError::CriticalPathNotFound {
        template: template.name.clone(),
        target: target.clone(),
    };
    if template.tasks.contains(target) {
        return Ok(Vec::new());
    }

    let producers = producers_until(domain, template, target)?;
    if !producers.contains_key(target) {
        return Err(not_found());
    }

    let mut chain = Vec::new();
    let mut visited = BTreeSet::from([target.clone()]);
    if !walk_back(&producers, template, target, difficulty, rng, &mut visited, &mut chain) {
        return Err(not_found());
    }
    chain.reverse();

    debug!(
        template = %template.name,
        target = %target,
        schemas = chain.len(),
        "Critical path located"
    );
    Ok(chain)
}

/// Extend `chain` from `current` back to a template task.
///
/// Producers are tried best-ranked first; a producer whose task is already
/// on the walk is skipped and a dead end backtracks to the next producer.
fn walk_back<'d>(
    producers: &BTreeMap<&'d TaskDescId, Vec<&'d DecompositionSchema>>,
    template: &ScenarioTemplate,
    current: &TaskDescId,
    difficulty: Difficulty,
    rng: &mut impl Rng,
    visited: &mut BTreeSet<TaskDescId>,
    chain: &mut Vec<&'d DecompositionSchema>,
) -> bool {
    let mut candidates: Vec<&'d DecompositionSchema> = producers
        .get(current)
        .into_iter()
        .flatten()
        .copied()
        .filter(|schema| !visited.contains(&schema.task))
        .collect();
    rank_schemas(&mut candidates, difficulty, &mut *rng);

    for schema in candidates {
        chain.push(schema);
        if template.tasks.contains(&schema.task) {
            return true;
        }
        visited.insert(schema.task.clone());
        if walk_back(producers, template, &schema.task, difficulty, &mut *rng, visited, chain) {
            return true;
        }
        visited.remove(&schema.task);
        chain.pop();
    }
    false
}

/// Reverse index subtask -> producing schemas, built breadth-first from the
/// template's tasks up to the level where `target` first appears.
fn producers_until<'d>(
    domain: &'d DomainIndex,
    template: &'d ScenarioTemplate,
    target: &TaskDescId,
) -> Result<BTreeMap<&'d TaskDescId, Vec<&'d DecompositionSchema>>, GenerateError> {
    let mut producers: BTreeMap<&'d TaskDescId, Vec<&'d DecompositionSchema>> = BTreeMap::new();
    let mut expanded: BTreeSet<&'d TaskDescId> = BTreeSet::new();
    let mut frontier: Vec<&'d TaskDescId> = template.tasks.iter().collect();

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for task in frontier {
            if !expanded.insert(task) {
                continue;
            }
            for schema in domain.schemas_for(task)? {
                for subtask in &schema.subtasks {
                    producers.entry(subtask).or_default().push(schema);
                    if !expanded.contains(subtask) {
                        next.push(subtask);
                    }
                }
            }
        }
        if producers.contains_key(target) {
            break;
        }
        frontier = next;
    }
    Ok(producers)
}
