//! Candidate ranking.
//!
//! Schemas are ranked by how close their difficulty range is to the
//! requested difficulty. Implementations are ranked first by how well the
//! offering object fits the setting, then by difficulty distance. Ranking is
//! best-first and stable; runs of equally scored candidates are then
//! shuffled so repeated generations vary.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use drill_domain::DomainIndex;
use drill_types::{
    DecompositionSchema, Difficulty, ObjectDescId, ServiceImplementation, SettingFit, SettingId,
};
use rand::Rng;
use rand::seq::SliceRandom;

/// Schema score: smaller difficulty distance is better.
pub type SchemaScore = Reverse<u32>;

/// Implementation score: setting fit, then smaller difficulty distance.
///
/// A type description with no reachable concrete leaf has fit `None`,
/// which orders below every scored candidate.
pub type ImplementationScore = (Option<SettingFit>, Reverse<u32>);

/// Sort `items` best-first by `key` (greatest key first), keeping equal
/// keys in their original order.
pub fn rank_stable<T, K: Ord>(items: &mut Vec<T>, key: impl Fn(&T) -> K) {
    let mut keyed: Vec<(K, T)> = items.drain(..).map(|item| (key(&item), item)).collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
}

/// Sort `items` best-first by `key`, then shuffle each run of equal keys.
pub fn rank_by_key<T, K: Ord>(items: &mut Vec<T>, key: impl Fn(&T) -> K, rng: &mut impl Rng) {
    let mut keyed: Vec<(K, T)> = items.drain(..).map(|item| (key(&item), item)).collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    for run in keyed.chunk_by_mut(|a, b| a.0 == b.0) {
        run.shuffle(rng);
    }
    items.extend(keyed.into_iter().map(|(_, item)| item));
}

/// Best fit in `setting` reachable from `object`: a concrete description's
/// own fit, or the maximum over a type's children. Stops at the best
/// possible fit. `None` when no concrete description is reachable.
pub fn best_setting_fit(
    domain: &DomainIndex,
    object: &ObjectDescId,
    setting: &SettingId,
) -> Option<SettingFit> {
    let mut visited = BTreeSet::new();
    best_fit_below(domain, object, setting, &mut visited)
}

fn best_fit_below<'a>(
    domain: &'a DomainIndex,
    object: &'a ObjectDescId,
    setting: &SettingId,
    visited: &mut BTreeSet<&'a ObjectDescId>,
) -> Option<SettingFit> {
    if !visited.insert(object) {
        return None;
    }
    let description = domain.object(object).ok()?;
    if let Some(fit) = description.setting_fit(setting) {
        return Some(fit);
    }
    let mut best: Option<SettingFit> = None;
    for child in description.children() {
        let fit = best_fit_below(domain, child, setting, visited);
        if fit > best {
            best = fit;
            if best == Some(SettingFit::BEST) {
                break;
            }
        }
    }
    best
}

/// Score of a schema for `difficulty`.
pub const fn schema_score(schema: &DecompositionSchema, difficulty: Difficulty) -> SchemaScore {
    Reverse(schema.difficulty.distance(difficulty))
}

/// Score of an implementation for `difficulty` in `setting`.
pub fn implementation_score(
    domain: &DomainIndex,
    implementation: &ServiceImplementation,
    difficulty: Difficulty,
    setting: &SettingId,
) -> ImplementationScore {
    (
        best_setting_fit(domain, &implementation.object, setting),
        Reverse(implementation.difficulty.distance(difficulty)),
    )
}

/// Rank schemas best-first, shuffling ties.
pub fn rank_schemas(
    schemas: &mut Vec<&DecompositionSchema>,
    difficulty: Difficulty,
    rng: &mut impl Rng,
) {
    rank_by_key(schemas, |schema| schema_score(schema, difficulty), rng);
}

/// Rank implementations best-first, shuffling ties.
pub fn rank_implementations(
    domain: &DomainIndex,
    implementations: &mut Vec<&ServiceImplementation>,
    difficulty: Difficulty,
    setting: &SettingId,
    rng: &mut impl Rng,
) {
    rank_by_key(
        implementations,
        |implementation| implementation_score(domain, implementation, difficulty, setting),
        rng,
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use drill_types::SchemaId;

    use super::*;
    use crate::test_support::{domain, rng};

    const SCHEMAS: &str = r"
tasks:
  - { id: treat, name: Treat }
  - { id: act, name: Act }
schemas:
  - { id: s1, task: treat, subtasks: [act], min_difficulty: 1, max_difficulty: 2 }
  - { id: s2, task: treat, subtasks: [act], min_difficulty: 3, max_difficulty: 4 }
  - { id: s3, task: treat, subtasks: [act], min_difficulty: 3, max_difficulty: 3 }
  - { id: s4, task: treat, subtasks: [act], min_difficulty: 6, max_difficulty: 7 }
";

    /// Two inheritance levels: furniture -> seat -> {bench, chair}.
    const FIT: &str = r"
settings: [{ id: park }, { id: home }]
objects:
  - { id: furniture, kind: object_type, children: [seat, table] }
  - { id: seat, kind: object_type, children: [bench, chair] }
  - { id: bench, kind: object, expected_settings: [park], unexpected_settings: [home] }
  - { id: chair, kind: object, unexpected_settings: [park] }
  - { id: table, kind: object, unexpected_settings: [park, home] }
  - { id: empty_type, kind: object_type }
";

    #[test]
    fn schema_in_range_ranks_first() {
        let index = domain(SCHEMAS);
        for seed in 0..10 {
            let mut schemas = index.schemas_for(&"treat".into()).unwrap();
            rank_schemas(&mut schemas, 3, &mut rng(seed));
            let top: BTreeSet<_> = schemas.iter().take(2).map(|s| s.id.clone()).collect();
            assert!(top.contains(&SchemaId::from("s2")));
            assert!(top.contains(&SchemaId::from("s3")));
            assert_eq!(schemas.last().unwrap().id, SchemaId::from("s4"));
        }
    }

    #[test]
    fn ties_are_shuffled_across_seeds() {
        let index = domain(SCHEMAS);
        let mut firsts = BTreeSet::new();
        for seed in 0..40 {
            let mut schemas = index.schemas_for(&"treat".into()).unwrap();
            rank_schemas(&mut schemas, 3, &mut rng(seed));
            firsts.insert(schemas.first().unwrap().id.clone());
        }
        assert_eq!(firsts.len(), 2);
    }

    #[test]
    fn setting_fit_recurses_through_two_levels() {
        let index = domain(FIT);
        let furniture = ObjectDescId::from("furniture");
        assert_eq!(
            best_setting_fit(&index, &furniture, &SettingId::from("park")),
            Some(SettingFit::Expected)
        );
        assert_eq!(
            best_setting_fit(&index, &furniture, &SettingId::from("home")),
            Some(SettingFit::Neutral)
        );
        assert_eq!(
            best_setting_fit(&index, &ObjectDescId::from("table"), &SettingId::from("home")),
            Some(SettingFit::Unexpected)
        );
    }

    #[test]
    fn leafless_type_ranks_below_everything() {
        let index = domain(FIT);
        let fit = best_setting_fit(&index, &ObjectDescId::from("empty_type"), &SettingId::from("park"));
        assert_eq!(fit, None);
        let none: ImplementationScore = (None, Reverse(0));
        let worst: ImplementationScore = (Some(SettingFit::Unexpected), Reverse(9));
        assert!(none < worst);
    }

    #[test]
    fn stable_rank_keeps_equal_order() {
        let mut items = vec![(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd')];
        rank_stable(&mut items, |item| item.0);
        assert_eq!(items, vec![(2, 'b'), (2, 'd'), (1, 'a'), (1, 'c')]);
    }
}
