//! Loads the bundled first-aid domain and checks the derived structure.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use drill_domain::DomainIndex;
use drill_types::{AgentType, ObjectDescId, ServiceId, SettingFit, SettingId, TaskDescId};

fn domain_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../domains/first_aid.yaml")
}

fn load() -> DomainIndex {
    DomainIndex::from_file(&domain_path()).unwrap()
}

#[test]
fn bundled_domain_loads() {
    let index = load();
    assert!(index.template("basic").is_some());
    assert_eq!(index.settings().count(), 4);
}

#[test]
fn heat_source_providers_cover_both_subservices() {
    let index = load();
    let providers = index.providers_of(&ServiceId::from("heat_source"));
    assert_eq!(providers.len(), 4);
    assert!(
        providers
            .iter()
            .all(|p| index.covers_service(&ServiceId::from("heat_source"), &p.service))
    );
}

#[test]
fn victims_inherit_agent_type() {
    let index = load();
    let victims: Vec<_> = index
        .agents_of_type(&AgentType::from("victim"))
        .iter()
        .map(|d| d.id.as_str().to_owned())
        .collect();
    assert_eq!(victims, vec!["adult_victim", "child_victim"]);
    assert!(index.is_agent(&ObjectDescId::from("child_victim")));
    assert!(!index.is_agent(&ObjectDescId::from("stove")));
}

#[test]
fn composite_tasks_know_their_schemas() {
    let index = load();
    let treat_burn = index.task(&TaskDescId::from("treat_burn")).unwrap();
    assert!(!treat_burn.is_atomic());
    assert_eq!(treat_burn.decompositions.len(), 2);
    assert!(index.task(&TaskDescId::from("report")).unwrap().is_atomic());
    assert_eq!(index.task_id_by_name("ensure_abc").unwrap().as_str(), "ensure_abc");
}

#[test]
fn setting_fit_comes_from_document_lists() {
    let index = load();
    let barbecue = index.object(&ObjectDescId::from("barbecue")).unwrap();
    assert_eq!(barbecue.setting_fit(&SettingId::from("park")), Some(SettingFit::Expected));
    assert_eq!(barbecue.setting_fit(&SettingId::from("home")), Some(SettingFit::Neutral));
}
