//! Programmatic demo world: a tavern, its cellar, a goblin, and a sword.

use eb_core::entity::{AbilityScores, Entity, ItemStats};
use eb_core::relationship::{Relationship, RelationshipKind};
use eb_core::resources::{DefyDeathState, StressMomentumPool};
use eb_core::universe::Universe;
use eb_engine::router::{Router, Session};
use eb_mechanics::ability::AbilityDef;
use eb_store::memory::{MemoryGraphRepo, MemoryTruthRepo};
use eb_store::ports::{GraphNode, GraphRepo, TruthRepo};

/// Build the demo world and a router seated in it.
pub fn demo_router() -> Router<MemoryTruthRepo, MemoryGraphRepo> {
    let mut truth = MemoryTruthRepo::new();
    let mut graph = MemoryGraphRepo::new();

    let universe = Universe::root("Prime Material");
    truth.save_universe(&universe).expect("seed universe");

    let mut tavern = Entity::location(universe.id, "The Crooked Flagon", "tavern", 2);
    tavern.description = "A low-beamed taproom that smells of ale and woodsmoke.".to_string();
    let mut cellar = Entity::location(universe.id, "The Flagon Cellar", "dungeon", 7);
    cellar.description = "Casks, cobwebs, and something scratching in the dark.".to_string();
    tavern
        .location_stats_mut()
        .unwrap()
        .exits
        .insert("down".to_string(), cellar.id);
    cellar
        .location_stats_mut()
        .unwrap()
        .exits
        .insert("up".to_string(), tavern.id);

    let mut hero = Entity::character(universe.id, "Wren", 20, 15);
    hero.description = "A wiry sellsword with a crooked grin.".to_string();
    {
        let stats = hero.character_stats_mut().unwrap();
        stats.abilities = AbilityScores {
            strength: 16,
            dexterity: 14,
            constitution: 14,
            intelligence: 10,
            wisdom: 12,
            charisma: 13,
        };
        stats.level = 3;
        stats.weapon_proficiencies.insert("shortsword".to_string());
        stats.skill_proficiencies.insert("persuasion".to_string());
        stats.skill_proficiencies.insert("investigation".to_string());
        stats.resources.stress_momentum = Some(StressMomentumPool::default());
        stats.resources.defy_death = DefyDeathState::with_uses(3);
        stats.resources.grant_spell_slots(1, 2);
    }

    let mut goblin = Entity::character(universe.id, "Cellar Goblin", 7, 13);
    goblin.description = "A goblin squatting in the cask shadows.".to_string();
    goblin.character_stats_mut().unwrap().hit_dice_rating = 1;

    let mut sword_stats = ItemStats::default();
    sword_stats.damage_dice = Some("1d6".to_string());
    sword_stats.damage_type = Some("piercing".to_string());
    let sword = Entity::item(universe.id, "Shortsword", sword_stats);

    for entity in [&tavern, &cellar, &hero, &goblin, &sword] {
        truth.save_entity(entity).expect("seed entity");
        graph
            .upsert_node(&GraphNode::from_entity(entity))
            .expect("seed node");
    }
    graph
        .create_relationship(&Relationship::new(
            universe.id,
            hero.id,
            RelationshipKind::LocatedIn,
            tavern.id,
        ))
        .expect("seed edge");
    graph
        .create_relationship(&Relationship::new(
            universe.id,
            goblin.id,
            RelationshipKind::LocatedIn,
            cellar.id,
        ))
        .expect("seed edge");
    graph
        .create_relationship(&Relationship::new(
            universe.id,
            hero.id,
            RelationshipKind::Wields,
            sword.id,
        ))
        .expect("seed edge");
    graph
        .create_relationship(&Relationship::new(
            universe.id,
            hero.id,
            RelationshipKind::Carries,
            sword.id,
        ))
        .expect("seed edge");

    let session = Session::new(universe.id, hero.id, tavern.id);
    let mut router = Router::new(truth, graph, session);

    let healing_word = AbilityDef::spell("Healing Word", 1).with_healing("1d4", 2);
    router.register_ability(healing_word).expect("seed ability");

    router
}
