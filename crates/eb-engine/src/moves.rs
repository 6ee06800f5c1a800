//! The move executor: GM moves that act on the world instead of just
//! narrating.
//!
//! Generative moves (introduce NPC, change environment, reveal a truth)
//! create entities. They ask the LLM port for contextual content first and
//! fall back to deterministic templates keyed by location type when the call
//! fails or times out. Created entities are persisted before their edges;
//! a failure between the two marks the orphan inactive again.

use serde_json::Value;
use tracing::warn;

use eb_core::entity::{CharacterStats, Entity, Stats};
use eb_core::ids::{EntityId, RelationshipId, UniverseId};
use eb_core::npc::{Motivation, NpcProfile, PersonalityTraits};
use eb_core::relationship::{Relationship, RelationshipKind};
use eb_mechanics::pbta::{GmMove, GmMoveType};
use eb_store::ports::{GraphNode, GraphRepo, LlmPort, TruthRepo};

use crate::error::EngineResult;
use crate::multiverse;

/// Context the executor needs about the scene.
#[derive(Debug, Clone)]
pub struct MoveSetting {
    pub universe: UniverseId,
    pub actor: EntityId,
    pub location: EntityId,
    pub location_name: String,
    /// tavern, dungeon, market, forest, ... Drives template choice.
    pub location_type: String,
    pub danger_level: u8,
    /// Items the actor carries, as (id, name).
    pub inventory: Vec<(EntityId, String)>,
    /// Recent event count; varies deterministic template picks.
    pub recent_events: u32,
}

/// What executing a GM move did to the world.
#[derive(Debug, Clone, Default)]
pub struct MoveReport {
    pub success: bool,
    pub narrative: String,
    pub entities_created: Vec<EntityId>,
    pub relationships_created: Vec<RelationshipId>,
    pub entities_modified: Vec<EntityId>,
    pub state_changes: Vec<String>,
    /// Damage the router should apply to the actor (DealDamage).
    pub damage_to_actor: Option<i32>,
    /// True when LLM generation failed and a template filled in.
    pub used_fallback: bool,
}

/// A template NPC for one location flavor.
struct NpcTemplate {
    name: &'static str,
    role: &'static str,
    description: &'static str,
    traits: PersonalityTraits,
    motivations: &'static [Motivation],
    speech_style: &'static str,
}

const TAVERN_NPCS: &[NpcTemplate] = &[
    NpcTemplate {
        name: "Greta",
        role: "barkeeper",
        description: "a weathered face that's seen too many bar fights",
        traits: PersonalityTraits {
            openness: 45,
            conscientiousness: 60,
            extraversion: 70,
            agreeableness: 55,
            neuroticism: 30,
        },
        motivations: &[Motivation::Wealth, Motivation::Safety],
        speech_style: "gruff",
    },
    NpcTemplate {
        name: "Old Tom",
        role: "patron",
        description: "nursing a drink and watching the door nervously",
        traits: PersonalityTraits {
            openness: 35,
            conscientiousness: 40,
            extraversion: 55,
            agreeableness: 60,
            neuroticism: 65,
        },
        motivations: &[Motivation::Safety, Motivation::Belonging],
        speech_style: "chatty",
    },
];

const DUNGEON_NPCS: &[NpcTemplate] = &[NpcTemplate {
    name: "The Prisoner",
    role: "prisoner",
    description: "shackled to the wall, eyes hollow with despair",
    traits: PersonalityTraits {
        openness: 40,
        conscientiousness: 35,
        extraversion: 20,
        agreeableness: 50,
        neuroticism: 85,
    },
    motivations: &[Motivation::Survival, Motivation::Safety],
    speech_style: "desperate",
}];

const MARKET_NPCS: &[NpcTemplate] = &[NpcTemplate {
    name: "Merchant Finn",
    role: "merchant",
    description: "gesturing enthusiastically at their wares",
    traits: PersonalityTraits {
        openness: 55,
        conscientiousness: 50,
        extraversion: 85,
        agreeableness: 45,
        neuroticism: 25,
    },
    motivations: &[Motivation::Wealth, Motivation::Fame],
    speech_style: "persuasive",
}];

const FOREST_NPCS: &[NpcTemplate] = &[NpcTemplate {
    name: "The Hermit",
    role: "hermit",
    description: "dressed in furs and leaves, eyes sharp as a hawk",
    traits: PersonalityTraits {
        openness: 80,
        conscientiousness: 55,
        extraversion: 25,
        agreeableness: 50,
        neuroticism: 35,
    },
    motivations: &[Motivation::Knowledge, Motivation::Safety],
    speech_style: "cryptic",
}];

const DEFAULT_NPCS: &[NpcTemplate] = &[NpcTemplate {
    name: "Stranger",
    role: "traveler",
    description: "watching you with guarded curiosity",
    traits: PersonalityTraits {
        openness: 50,
        conscientiousness: 50,
        extraversion: 50,
        agreeableness: 50,
        neuroticism: 50,
    },
    motivations: &[Motivation::Survival],
    speech_style: "cautious",
}];

/// Environment features: (name, description) by location type.
const DUNGEON_FEATURES: &[(&str, &str)] = &[
    ("Hidden Passage", "A section of wall slides aside, revealing darkness beyond."),
    ("Ancient Inscription", "Faded writing covers this section of wall."),
];
const TAVERN_FEATURES: &[(&str, &str)] = &[
    ("Back Room", "A door you hadn't noticed leads to a private area."),
    ("Loose Floorboard", "A board creaks oddly, suggesting a hollow beneath."),
];
const FOREST_FEATURES: &[(&str, &str)] = &[
    ("Hollow Tree", "An ancient oak with a dark cavity in its trunk."),
    ("Overgrown Ruins", "Stone foundations barely visible through the growth."),
];
const DEFAULT_FEATURES: &[(&str, &str)] = &[
    ("Shadowy Corner", "An area the light doesn't quite reach."),
    ("Strange Mark", "An unfamiliar symbol scratched into the surface."),
];

fn npc_templates(location_type: &str) -> &'static [NpcTemplate] {
    match location_type {
        "tavern" => TAVERN_NPCS,
        "dungeon" => DUNGEON_NPCS,
        "market" => MARKET_NPCS,
        "forest" => FOREST_NPCS,
        _ => DEFAULT_NPCS,
    }
}

fn feature_templates(location_type: &str) -> &'static [(&'static str, &'static str)] {
    match location_type {
        "dungeon" => DUNGEON_FEATURES,
        "tavern" => TAVERN_FEATURES,
        "forest" => FOREST_FEATURES,
        _ => DEFAULT_FEATURES,
    }
}

/// Execute a GM move against the world.
pub fn execute_gm_move(
    gm_move: &GmMove,
    setting: &MoveSetting,
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    llm: Option<&mut (dyn LlmPort + 'static)>,
) -> EngineResult<MoveReport> {
    match gm_move.move_type {
        GmMoveType::IntroduceNpc => introduce_npc(setting, truth, graph, llm),
        GmMoveType::ChangeEnvironment => change_environment(setting, truth, graph, llm),
        GmMoveType::RevealUnwelcomeTruth => reveal_truth(setting, truth, graph, llm),
        GmMoveType::TakeAway => take_away(setting, truth, graph),
        GmMoveType::DealDamage => Ok(MoveReport {
            success: true,
            narrative: gm_move.description.clone(),
            damage_to_actor: gm_move.damage,
            entities_modified: vec![setting.actor],
            state_changes: vec![format!("took {} damage", gm_move.damage.unwrap_or(0))],
            ..MoveReport::default()
        }),
        GmMoveType::Capture => capture(setting, graph),
        GmMoveType::SeparateThem => Ok(MoveReport {
            success: true,
            narrative: gm_move.description.clone(),
            state_changes: vec!["separated from allies".to_string()],
            ..MoveReport::default()
        }),
        GmMoveType::ShowDanger
        | GmMoveType::OfferOpportunity
        | GmMoveType::UseMonsterMove
        | GmMoveType::AdvanceTime => Ok(MoveReport {
            success: true,
            narrative: gm_move.description.clone(),
            ..MoveReport::default()
        }),
    }
}

/// Parameters for a generated NPC, from the LLM or a template.
struct NpcParams {
    name: String,
    role: String,
    description: String,
    traits: PersonalityTraits,
    motivations: Vec<Motivation>,
    speech_style: String,
    from_template: bool,
}

fn npc_params_from_llm(llm: &mut (dyn LlmPort + 'static), setting: &MoveSetting) -> Option<NpcParams> {
    let prompt = format!(
        "Generate an NPC for a {} (danger {}) named location '{}'.",
        setting.location_type, setting.danger_level, setting.location_name
    );
    let schema = r#"{"name": "string", "role": "string", "description": "string",
        "traits": {"openness": 0, "conscientiousness": 0, "extraversion": 0,
                   "agreeableness": 0, "neuroticism": 0},
        "speech_style": "string"}"#;
    let value = match llm.generate_structured(&prompt, schema) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "npc generation failed, using template");
            return None;
        }
    };
    let name = value.get("name")?.as_str()?.to_string();
    if name.is_empty() {
        return None;
    }
    let trait_of = |key: &str| -> u8 {
        value
            .get("traits")
            .and_then(|t| t.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(50)
            .min(100) as u8
    };
    Some(NpcParams {
        name,
        role: value
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("traveler")
            .to_string(),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        traits: PersonalityTraits {
            openness: trait_of("openness"),
            conscientiousness: trait_of("conscientiousness"),
            extraversion: trait_of("extraversion"),
            agreeableness: trait_of("agreeableness"),
            neuroticism: trait_of("neuroticism"),
        },
        motivations: vec![Motivation::Survival],
        speech_style: value
            .get("speech_style")
            .and_then(Value::as_str)
            .unwrap_or("neutral")
            .to_string(),
        from_template: false,
    })
}

fn npc_params_from_template(setting: &MoveSetting) -> NpcParams {
    let templates = npc_templates(&setting.location_type);
    let index = (setting.danger_level as usize + setting.recent_events as usize) % templates.len();
    let template = &templates[index];
    NpcParams {
        name: template.name.to_string(),
        role: template.role.to_string(),
        description: template.description.to_string(),
        traits: template.traits,
        motivations: template.motivations.to_vec(),
        speech_style: template.speech_style.to_string(),
        from_template: true,
    }
}

fn introduce_npc(
    setting: &MoveSetting,
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    llm: Option<&mut (dyn LlmPort + 'static)>,
) -> EngineResult<MoveReport> {
    let params = llm
        .and_then(|port| npc_params_from_llm(port, setting))
        .unwrap_or_else(|| npc_params_from_template(setting));

    let mut npc = Entity::character(setting.universe, unique_name(truth, setting, &params.name)?, 10, 10);
    npc.description = params.description.clone();
    npc.tags = vec!["npc".to_string(), params.role.clone()];
    if let Stats::Character(stats) = &mut npc.stats {
        scale_npc_stats(stats, setting.danger_level);
    }

    // Entity first, then profile and edges; on edge failure the orphan is
    // deactivated so it never surfaces half-linked.
    truth.save_entity(&npc)?;
    let persisted = persist_npc_links(setting, truth, graph, &npc, &params);
    let located_in = match persisted {
        Ok(edge) => edge,
        Err(err) => {
            let mut orphan = npc.clone();
            orphan.active = false;
            orphan.version += 1;
            truth.save_entity(&orphan)?;
            return Err(err);
        }
    };

    Ok(MoveReport {
        success: true,
        narrative: format!(
            "{}, {} — {}.",
            npc.name, params.role, params.description
        ),
        entities_created: vec![npc.id],
        relationships_created: vec![located_in],
        state_changes: vec![format!("new npc: {}", npc.name)],
        used_fallback: params.from_template,
        ..MoveReport::default()
    })
}

fn persist_npc_links(
    setting: &MoveSetting,
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    npc: &Entity,
    params: &NpcParams,
) -> EngineResult<RelationshipId> {
    let mut profile = NpcProfile::new(npc.id);
    profile.traits = params.traits;
    profile.motivations = params.motivations.clone();
    profile.speech_style = params.speech_style.clone();
    truth.save_npc_profile(&profile)?;

    graph.upsert_node(&GraphNode::from_entity(npc))?;
    let edge = Relationship::new(
        setting.universe,
        npc.id,
        RelationshipKind::LocatedIn,
        setting.location,
    );
    graph.create_relationship(&edge)?;
    Ok(edge.id)
}

/// Avoid duplicate-name collisions when a template repeats.
fn unique_name(
    truth: &dyn TruthRepo,
    setting: &MoveSetting,
    base: &str,
) -> EngineResult<String> {
    if truth.find_entity_by_name(base, setting.universe)?.is_none() {
        return Ok(base.to_string());
    }
    for suffix in 2..100 {
        let candidate = format!("{base} {suffix}");
        if truth.find_entity_by_name(&candidate, setting.universe)?.is_none() {
            return Ok(candidate);
        }
    }
    Ok(format!("{base} {}", EntityId::new()))
}

fn scale_npc_stats(stats: &mut CharacterStats, danger_level: u8) {
    let hp = 6 + danger_level as i32;
    stats.hp_max = hp;
    stats.hp_current = hp;
    stats.ac = 10 + (danger_level / 5) as i32;
    stats.hit_dice_rating = 1 + (danger_level / 5) as u32;
}

fn change_environment(
    setting: &MoveSetting,
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    llm: Option<&mut (dyn LlmPort + 'static)>,
) -> EngineResult<MoveReport> {
    let (name, description, used_fallback) = match llm {
        Some(port) => match port.generate_narrative(&format!(
            "Describe a new feature appearing in {} ({}).",
            setting.location_name, setting.location_type
        )) {
            Ok(text) if !text.is_empty() => ("Unfolding Scene".to_string(), text, false),
            Ok(_) | Err(_) => template_feature(setting),
        },
        None => template_feature(setting),
    };

    let mut feature = Entity::new(
        setting.universe,
        unique_name(truth, setting, &name)?,
        Stats::Object,
    );
    feature.description = description.clone();
    feature.tags = vec!["feature".to_string()];
    if setting.danger_level >= 12 {
        feature.tags.push("hazard".to_string());
    }

    truth.save_entity(&feature)?;
    let edge = Relationship::new(
        setting.universe,
        setting.location,
        RelationshipKind::Contains,
        feature.id,
    );
    if let Err(err) = graph
        .upsert_node(&GraphNode::from_entity(&feature))
        .and_then(|_| graph.create_relationship(&edge))
    {
        let mut orphan = feature.clone();
        orphan.active = false;
        orphan.version += 1;
        truth.save_entity(&orphan)?;
        return Err(err.into());
    }

    Ok(MoveReport {
        success: true,
        narrative: description,
        entities_created: vec![feature.id],
        relationships_created: vec![edge.id],
        state_changes: vec![format!("new feature: {}", feature.name)],
        used_fallback,
        ..MoveReport::default()
    })
}

fn template_feature(setting: &MoveSetting) -> (String, String, bool) {
    let templates = feature_templates(&setting.location_type);
    let index = (setting.danger_level as usize + setting.recent_events as usize) % templates.len();
    let (name, description) = templates[index];
    (name.to_string(), description.to_string(), true)
}

fn reveal_truth(
    setting: &MoveSetting,
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
    llm: Option<&mut (dyn LlmPort + 'static)>,
) -> EngineResult<MoveReport> {
    let (description, used_fallback) = match llm {
        Some(port) => match port.generate_narrative(&format!(
            "Reveal an unwelcome truth about {} to the player.",
            setting.location_name
        )) {
            Ok(text) if !text.is_empty() => (text, false),
            Ok(_) | Err(_) => (default_truth(setting), true),
        },
        None => (default_truth(setting), true),
    };

    let mut clue = Entity::new(
        setting.universe,
        unique_name(truth, setting, "Troubling Detail")?,
        Stats::Object,
    );
    clue.description = description.clone();
    clue.tags = vec!["clue".to_string()];

    truth.save_entity(&clue)?;
    let edge = Relationship::new(
        setting.universe,
        setting.location,
        RelationshipKind::Contains,
        clue.id,
    );
    if let Err(err) = graph
        .upsert_node(&GraphNode::from_entity(&clue))
        .and_then(|_| graph.create_relationship(&edge))
    {
        let mut orphan = clue.clone();
        orphan.active = false;
        orphan.version += 1;
        truth.save_entity(&orphan)?;
        return Err(err.into());
    }

    Ok(MoveReport {
        success: true,
        narrative: description,
        entities_created: vec![clue.id],
        relationships_created: vec![edge.id],
        used_fallback,
        ..MoveReport::default()
    })
}

fn default_truth(setting: &MoveSetting) -> String {
    format!(
        "Something about {} is not what it seems. You notice a detail you wish you hadn't.",
        setting.location_name
    )
}

fn take_away(
    setting: &MoveSetting,
    truth: &mut dyn TruthRepo,
    graph: &mut dyn GraphRepo,
) -> EngineResult<MoveReport> {
    let Some((item_id, item_name)) = setting
        .inventory
        .iter()
        .min_by(|a, b| a.1.cmp(&b.1))
        .cloned()
    else {
        return Ok(MoveReport {
            success: true,
            narrative: "You have nothing to lose... this time.".to_string(),
            ..MoveReport::default()
        });
    };

    let lost = multiverse::mutate_entity(truth, graph, item_id, setting.universe, |item| {
        item.active = false;
    })?;

    for edge in graph.relationships_of(lost.id, setting.universe, None)? {
        if edge.kind.is_inventory() && edge.target == lost.id && edge.source == setting.actor {
            graph.delete_relationship(edge.id)?;
        }
    }

    Ok(MoveReport {
        success: true,
        narrative: format!("Your {item_name} slips from your grasp and is lost!"),
        entities_modified: vec![lost.id],
        state_changes: vec![format!("lost: {item_name}")],
        ..MoveReport::default()
    })
}

fn capture(setting: &MoveSetting, graph: &mut dyn GraphRepo) -> EngineResult<MoveReport> {
    let edge = Relationship::new(
        setting.universe,
        setting.actor,
        RelationshipKind::TrappedIn,
        setting.location,
    );
    graph.create_relationship(&edge)?;
    Ok(MoveReport {
        success: true,
        narrative: format!("You find yourself trapped in {}!", setting.location_name),
        relationships_created: vec![edge.id],
        state_changes: vec![format!("trapped in {}", setting.location_name)],
        ..MoveReport::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_core::entity::ItemStats;
    use eb_core::universe::Universe;
    use eb_mechanics::pbta::{select_gm_move, MoveContext};
    use eb_store::memory::{CannedLlm, MemoryGraphRepo, MemoryTruthRepo, OfflineLlm};
    use eb_store::ports::LlmPort;
    use serde_json::json;

    fn scene() -> (MemoryTruthRepo, MemoryGraphRepo, MoveSetting) {
        let mut truth = MemoryTruthRepo::new();
        let mut graph = MemoryGraphRepo::new();
        let universe = Universe::root("Prime");
        truth.save_universe(&universe).unwrap();

        let tavern = Entity::location(universe.id, "The Prancing Pony", "tavern", 3);
        truth.save_entity(&tavern).unwrap();
        graph.upsert_node(&GraphNode::from_entity(&tavern)).unwrap();

        let hero = Entity::character(universe.id, "Kael", 12, 14);
        truth.save_entity(&hero).unwrap();
        graph.upsert_node(&GraphNode::from_entity(&hero)).unwrap();

        let setting = MoveSetting {
            universe: universe.id,
            actor: hero.id,
            location: tavern.id,
            location_name: tavern.name.clone(),
            location_type: "tavern".to_string(),
            danger_level: 3,
            inventory: Vec::new(),
            recent_events: 0,
        };
        (truth, graph, setting)
    }

    fn npc_move() -> GmMove {
        GmMove {
            move_type: GmMoveType::IntroduceNpc,
            is_hard: false,
            description: "Someone new arrives on the scene...".to_string(),
            damage: None,
        }
    }

    #[test]
    fn introduce_npc_from_llm() {
        let (mut truth, mut graph, setting) = scene();
        let mut llm = CannedLlm::new();
        llm.push_structured(json!({
            "name": "Vexa the Quiet",
            "role": "spy",
            "description": "lingering near the hearth, listening",
            "traits": {"openness": 60, "conscientiousness": 70, "extraversion": 30,
                        "agreeableness": 40, "neuroticism": 45},
            "speech_style": "terse"
        }));

        let report = execute_gm_move(
            &npc_move(),
            &setting,
            &mut truth,
            &mut graph,
            Some(&mut llm as &mut dyn LlmPort),
        )
        .unwrap();

        assert!(report.success);
        assert!(!report.used_fallback);
        assert_eq!(report.entities_created.len(), 1);
        assert_eq!(report.relationships_created.len(), 1);

        let npc = truth
            .find_entity_by_name("Vexa the Quiet", setting.universe)
            .unwrap()
            .unwrap();
        assert!(npc.is_character());
        // Profile persisted alongside the entity.
        let profile = truth.load_npc_profile(npc.id).unwrap().unwrap();
        assert_eq!(profile.traits.extraversion, 30);
        assert_eq!(profile.speech_style, "terse");
        // Located in the tavern.
        let present = graph.entities_at_location(setting.location, setting.universe).unwrap();
        assert!(present.contains(&npc.id));
    }

    #[test]
    fn introduce_npc_falls_back_to_template_on_timeout() {
        let (mut truth, mut graph, setting) = scene();
        let mut llm = OfflineLlm;

        let report = execute_gm_move(
            &npc_move(),
            &setting,
            &mut truth,
            &mut graph,
            Some(&mut llm as &mut dyn LlmPort),
        )
        .unwrap();

        assert!(report.success);
        assert!(report.used_fallback);
        // Tavern template: danger 3 + recent 0 -> index 1 of 2 -> Old Tom.
        let npc = truth
            .find_entity_by_name("Old Tom", setting.universe)
            .unwrap()
            .unwrap();
        assert!(truth.load_npc_profile(npc.id).unwrap().is_some());
    }

    #[test]
    fn introduce_npc_without_llm_uses_template() {
        let (mut truth, mut graph, setting) = scene();
        let report = execute_gm_move(&npc_move(), &setting, &mut truth, &mut graph, None).unwrap();
        assert!(report.used_fallback);
        assert_eq!(report.entities_created.len(), 1);
    }

    #[test]
    fn repeated_template_names_stay_unique() {
        let (mut truth, mut graph, setting) = scene();
        execute_gm_move(&npc_move(), &setting, &mut truth, &mut graph, None).unwrap();
        execute_gm_move(&npc_move(), &setting, &mut truth, &mut graph, None).unwrap();
        assert!(truth.find_entity_by_name("Old Tom", setting.universe).unwrap().is_some());
        assert!(truth.find_entity_by_name("Old Tom 2", setting.universe).unwrap().is_some());
    }

    #[test]
    fn change_environment_creates_contained_feature() {
        let (mut truth, mut graph, setting) = scene();
        let gm_move = GmMove {
            move_type: GmMoveType::ChangeEnvironment,
            is_hard: false,
            description: String::new(),
            damage: None,
        };
        let report = execute_gm_move(&gm_move, &setting, &mut truth, &mut graph, None).unwrap();
        assert_eq!(report.entities_created.len(), 1);

        let feature_id = report.entities_created[0];
        let edges = graph
            .relationships_of(setting.location, setting.universe, Some(RelationshipKind::Contains))
            .unwrap();
        assert!(edges.iter().any(|r| r.target == feature_id));
    }

    #[test]
    fn deal_damage_reports_damage_for_router() {
        let (mut truth, mut graph, setting) = scene();
        let gm_move = select_gm_move(MoveContext {
            danger_level: 12,
            in_combat: true,
            ..MoveContext::default()
        });
        assert_eq!(gm_move.move_type, GmMoveType::DealDamage);

        let report = execute_gm_move(&gm_move, &setting, &mut truth, &mut graph, None).unwrap();
        assert_eq!(report.damage_to_actor, Some(4));
        assert_eq!(report.entities_modified, vec![setting.actor]);
    }

    #[test]
    fn take_away_marks_item_lost_and_drops_edges() {
        let (mut truth, mut graph, mut setting) = scene();
        let sword = Entity::item(setting.universe, "Rusty Sword", ItemStats::default());
        truth.save_entity(&sword).unwrap();
        graph.upsert_node(&GraphNode::from_entity(&sword)).unwrap();
        graph
            .create_relationship(&Relationship::new(
                setting.universe,
                setting.actor,
                RelationshipKind::Carries,
                sword.id,
            ))
            .unwrap();
        setting.inventory = vec![(sword.id, sword.name.clone())];

        let gm_move = GmMove {
            move_type: GmMoveType::TakeAway,
            is_hard: true,
            description: String::new(),
            damage: None,
        };
        let report = execute_gm_move(&gm_move, &setting, &mut truth, &mut graph, None).unwrap();
        assert_eq!(report.entities_modified, vec![sword.id]);

        let lost = truth.load_entity(sword.id, setting.universe).unwrap().unwrap();
        assert!(!lost.active);
        let edges = graph.relationships_of(sword.id, setting.universe, None).unwrap();
        assert!(edges.iter().all(|r| r.kind != RelationshipKind::Carries));
    }

    #[test]
    fn take_away_with_empty_inventory_is_narrative_only() {
        let (mut truth, mut graph, setting) = scene();
        let gm_move = GmMove {
            move_type: GmMoveType::TakeAway,
            is_hard: true,
            description: String::new(),
            damage: None,
        };
        let report = execute_gm_move(&gm_move, &setting, &mut truth, &mut graph, None).unwrap();
        assert!(report.entities_modified.is_empty());
        assert!(report.narrative.contains("nothing to lose"));
    }

    #[test]
    fn capture_creates_trapped_edge() {
        let (mut truth, mut graph, setting) = scene();
        let gm_move = GmMove {
            move_type: GmMoveType::Capture,
            is_hard: true,
            description: String::new(),
            damage: None,
        };
        let report = execute_gm_move(&gm_move, &setting, &mut truth, &mut graph, None).unwrap();
        assert_eq!(report.relationships_created.len(), 1);
        let edges = graph
            .relationships_of(setting.actor, setting.universe, Some(RelationshipKind::TrappedIn))
            .unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn narrative_moves_touch_nothing() {
        let (mut truth, mut graph, setting) = scene();
        let gm_move = GmMove {
            move_type: GmMoveType::ShowDanger,
            is_hard: false,
            description: "Something dangerous reveals itself...".to_string(),
            damage: None,
        };
        let report = execute_gm_move(&gm_move, &setting, &mut truth, &mut graph, None).unwrap();
        assert!(report.entities_created.is_empty());
        assert!(report.entities_modified.is_empty());
        assert_eq!(report.narrative, gm_move.description);
    }
}
