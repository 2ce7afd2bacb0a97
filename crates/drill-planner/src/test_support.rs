//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use drill_domain::DomainIndex;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// A lamp can light a room directly; a switch needs an electrician.
pub const LAMP_DOMAIN: &str = r"
services:
  - { id: light, name: Light }
  - { id: electric_light, name: Electric light, parent: light }
  - { id: power, name: Power }
settings:
  - { id: home, name: Home }
  - { id: park, name: Park }
objects:
  - { id: light_source, name: Light source, kind: object_type, children: [lamp] }
  - { id: lamp, name: Lamp, kind: object, offers: [lamp_light, lamp_dim], expected_settings: [home] }
  - { id: switch, name: Switch, kind: object, offers: [switch_power] }
  - { id: electrician, name: Electrician, kind: agent, agent_type: electrician }
tasks:
  - { id: enter, name: Enter }
  - { id: leave, name: Leave }
  - { id: light_room, name: Light room }
  - { id: walk_to_switch, name: Walk to switch }
  - { id: switch_on, name: Switch on, requires: [light] }
  - { id: use_power, name: Use power, requires: [power] }
  - { id: wire_switch, name: Wire switch }
schemas:
  - { id: light_by_switch, task: light_room, subtasks: [walk_to_switch, switch_on], min_difficulty: 1, max_difficulty: 3 }
implementations:
  - { id: lamp_light, name: Lamp light, service: light, object: lamp, min_difficulty: 1, max_difficulty: 3 }
  - { id: lamp_dim, name: Dim lamp, service: light, object: lamp, constraints: [lamp_light], min_difficulty: 1, max_difficulty: 1 }
  - id: switch_power
    service: power
    object: switch
    actions: [wire_switch]
    actors: [electrician]
    min_difficulty: 1
    max_difficulty: 2
templates:
  - { name: evening, tasks: [enter, light_room, leave] }
";

/// Parse a domain fixture.
pub fn domain(yaml: &str) -> DomainIndex {
    DomainIndex::from_yaml_str(yaml).unwrap()
}

/// The lamp domain.
pub fn lamp_domain() -> DomainIndex {
    domain(LAMP_DOMAIN)
}

/// Seeded random source.
pub fn rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}
