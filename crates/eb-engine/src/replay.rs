//! Event-log replay.
//!
//! Current state is a function of the event history: every state-changing
//! event carries absolute post-state values (`hp_after`, destination ids),
//! so replaying a universe's log over its starting entities reproduces the
//! present. This is also how snapshots materialize: `snapshot_at` hands back
//! an event prefix and replay folds it.

use std::collections::HashMap;

use uuid::Uuid;

use eb_core::entity::Entity;
use eb_core::event::{Event, EventType};
use eb_core::ids::EntityId;

/// State rebuilt from a log.
#[derive(Debug, Default)]
pub struct ReplayState {
    /// Entities by id, with HP and active flags as of the last event.
    pub entities: HashMap<EntityId, Entity>,
    /// entity -> location, as of the last TRAVEL event.
    pub locations: HashMap<EntityId, EntityId>,
}

impl ReplayState {
    pub fn hp_of(&self, id: EntityId) -> Option<i32> {
        self.entities
            .get(&id)
            .and_then(|e| e.character_stats())
            .map(|s| s.hp_current)
    }
}

fn payload_entity_id(event: &Event, key: &str) -> Option<EntityId> {
    event
        .payload_str(key)
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(EntityId)
}

/// Fold a universe's events over its starting entities.
///
/// `base` is the entity set as of the start of the log (for a fresh
/// universe, the seeded world). Events referencing entities that were
/// created mid-log are applied once a CREATED payload or later save
/// introduces them; unknown references are skipped rather than invented.
pub fn replay(base: Vec<Entity>, events: &[Event]) -> ReplayState {
    let mut state = ReplayState::default();
    for entity in base {
        state.entities.insert(entity.id, entity);
    }

    for event in events {
        match event.event_type {
            EventType::Damage
            | EventType::Attack
            | EventType::CombatRound
            | EventType::Heal => {
                if let (Some(target), Some(hp)) = (event.target_id, event.payload_i64("hp_after")) {
                    set_hp(&mut state, target, hp as i32);
                }
                if event.payload_i64("target_died") == Some(1) {
                    if let Some(target) = event.target_id {
                        set_active(&mut state, target, false);
                    }
                }
            }
            EventType::Death => {
                set_hp(&mut state, event.actor_id, 0);
                set_active(&mut state, event.actor_id, false);
            }
            EventType::ShortRest | EventType::LongRest => {
                if let Some(hp) = event.payload_i64("hp_after") {
                    set_hp(&mut state, event.actor_id, hp as i32);
                }
            }
            EventType::ItemLost => {
                if let Some(item) = event.target_id {
                    set_active(&mut state, item, false);
                }
            }
            EventType::Travel => {
                if let Some(to) = payload_entity_id(event, "to_location_id") {
                    state.locations.insert(event.actor_id, to);
                }
            }
            EventType::WorldTravel => {
                if let Some(location) = event.location_id {
                    state.locations.insert(event.actor_id, location);
                }
            }
            _ => {}
        }
    }

    state
}

fn set_hp(state: &mut ReplayState, id: EntityId, hp: i32) {
    if let Some(stats) = state.entities.get_mut(&id).and_then(|e| e.character_stats_mut()) {
        stats.hp_current = hp.clamp(0, stats.hp_max);
    }
}

fn set_active(state: &mut ReplayState, id: EntityId, active: bool) {
    if let Some(entity) = state.entities.get_mut(&id) {
        entity.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_core::event::EventOutcome;
    use eb_core::ids::UniverseId;

    #[test]
    fn damage_and_heal_track_hp() {
        let universe = UniverseId::new();
        let hero = Entity::character(universe, "Kael", 20, 14);
        let goblin = Entity::character(universe, "Goblin", 7, 13);
        let hero_id = hero.id;
        let goblin_id = goblin.id;

        let events = vec![
            Event::new(universe, EventType::Attack, hero_id)
                .with_target(goblin_id)
                .with_outcome(EventOutcome::Hit)
                .with_payload("hp_after", 2),
            Event::new(universe, EventType::Damage, goblin_id)
                .with_target(hero_id)
                .with_payload("hp_after", 15),
            Event::new(universe, EventType::Heal, hero_id)
                .with_target(hero_id)
                .with_payload("hp_after", 19),
        ];

        let state = replay(vec![hero, goblin], &events);
        assert_eq!(state.hp_of(goblin_id), Some(2));
        assert_eq!(state.hp_of(hero_id), Some(19));
    }

    #[test]
    fn death_flags_and_zeroes() {
        let universe = UniverseId::new();
        let goblin = Entity::character(universe, "Goblin", 7, 13);
        let goblin_id = goblin.id;

        let events = vec![Event::new(universe, EventType::Death, goblin_id)];
        let state = replay(vec![goblin], &events);
        assert_eq!(state.hp_of(goblin_id), Some(0));
        assert!(!state.entities[&goblin_id].active);
    }

    #[test]
    fn travel_updates_location() {
        let universe = UniverseId::new();
        let hero = Entity::character(universe, "Kael", 20, 14);
        let cellar = Entity::location(universe, "Cellar", "dungeon", 5);
        let hero_id = hero.id;
        let cellar_id = cellar.id;

        let events = vec![Event::new(universe, EventType::Travel, hero_id)
            .with_payload("to_location_id", cellar_id.0.to_string())];
        let state = replay(vec![hero, cellar], &events);
        assert_eq!(state.locations.get(&hero_id), Some(&cellar_id));
    }

    #[test]
    fn replay_is_deterministic() {
        let universe = UniverseId::new();
        let hero = Entity::character(universe, "Kael", 20, 14);
        let hero_id = hero.id;
        let events = vec![
            Event::new(universe, EventType::Damage, hero_id)
                .with_target(hero_id)
                .with_payload("hp_after", 11),
        ];
        let a = replay(vec![hero.clone()], &events);
        let b = replay(vec![hero], &events);
        assert_eq!(a.hp_of(hero_id), b.hp_of(hero_id));
    }

    #[test]
    fn unknown_references_are_skipped() {
        let universe = UniverseId::new();
        let events = vec![Event::new(universe, EventType::Damage, EntityId::new())
            .with_target(EntityId::new())
            .with_payload("hp_after", 3)];
        let state = replay(Vec::new(), &events);
        assert!(state.entities.is_empty());
    }
}
