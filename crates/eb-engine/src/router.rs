//! The turn orchestrator.
//!
//! One router per session, single-threaded by invariant. A turn runs
//! through fixed phases: load context, dispatch the intent to the right
//! skill, apply effects and resource debits, record events, and compose the
//! result. A PbtA miss hands the turn to the move executor before the
//! result goes back.

use std::collections::HashMap;

use tracing::{debug, error, info};

use eb_core::condition::{ConditionInstance, ConditionType};
use eb_core::entity::{Ability, CharacterStats, Entity};
use eb_core::event::{Event, EventOutcome, EventType};
use eb_core::ids::{AbilityId, EntityId, EventId, UniverseId};
use eb_core::relationship::{Relationship, RelationshipKind};
use eb_mechanics::ability::{AbilityDef, AbilitySource, Mechanism};
use eb_mechanics::checks::{resolve_attack, skill_check, Cover, Skill, Weapon};
use eb_mechanics::dice::{DiceRoller, SystemRoller};
use eb_mechanics::overlay::PhysicsOverlay;
use eb_mechanics::pbta::{classify, select_gm_move, strong_hit_bonus, weak_hit_complication, MoveContext, PbtaOutcome};
use eb_mechanics::solo::{defy_death, roll_fray, DefyDeathConfig, FrayConfig};
use eb_store::ports::{GraphRepo, LlmPort, Transaction, TruthRepo};
use eb_store::staged::StagedTruth;

use crate::context::{Context, EntitySummary, Intent, IntentKind, KnownEntity, SkillResult, TurnResult};
use crate::effects::{EffectPipeline, TargetRef};
use crate::error::{EngineError, EngineResult};
use crate::moves::{execute_gm_move, MoveSetting};
use crate::multiverse;
use crate::rest;

/// Per-session state the router carries between turns.
#[derive(Debug, Clone)]
pub struct Session {
    pub universe_id: UniverseId,
    pub actor_id: EntityId,
    pub location_id: EntityId,
    pub turn_count: u32,
    pub in_combat: bool,
    pub combat_round: u32,
    /// Soft GM moves made recently; two warnings escalate.
    pub recent_soft_moves: u32,
}

impl Session {
    pub fn new(universe_id: UniverseId, actor_id: EntityId, location_id: EntityId) -> Self {
        Self {
            universe_id,
            actor_id,
            location_id,
            turn_count: 0,
            in_combat: false,
            combat_round: 0,
            recent_soft_moves: 0,
        }
    }
}

/// What one solo combat round-start produced.
#[derive(Debug, Clone, Default)]
pub struct SoloRoundReport {
    pub round: u32,
    pub momentum_gained: u32,
    pub fray_damage: i32,
    pub fray_kills: Vec<EntityId>,
    pub cooldowns_recharged: Vec<String>,
    pub events: Vec<EventId>,
}

/// The turn orchestrator. Owns the stores, the effect pipeline, the ability
/// registry, and the dice roller for one session.
///
/// Every truth-store write a turn makes is staged in `turn` and committed
/// in one atomic step when the turn succeeds; a failed turn drops the
/// buffer, so the store never sees partial state.
pub struct Router<T: TruthRepo, G: GraphRepo> {
    truth: T,
    graph: G,
    llm: Option<Box<dyn LlmPort>>,
    pipeline: EffectPipeline,
    abilities: HashMap<AbilityId, AbilityDef>,
    overlay: Option<PhysicsOverlay>,
    roller: Box<dyn DiceRoller>,
    /// The running turn's staged writes.
    turn: Transaction,
    pub session: Session,
}

impl<T: TruthRepo, G: GraphRepo> Router<T, G> {
    pub fn new(truth: T, graph: G, session: Session) -> Self {
        Self {
            truth,
            graph,
            llm: None,
            pipeline: EffectPipeline::new(),
            abilities: HashMap::new(),
            overlay: None,
            roller: Box::new(SystemRoller),
            turn: Transaction::new(),
            session,
        }
    }

    pub fn with_llm(mut self, llm: Box<dyn LlmPort>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_roller(mut self, roller: Box<dyn DiceRoller>) -> Self {
        self.roller = roller;
        self
    }

    pub fn with_overlay(mut self, overlay: PhysicsOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn register_ability(&mut self, ability: AbilityDef) -> EngineResult<AbilityId> {
        ability.validate()?;
        let id = ability.id;
        self.abilities.insert(id, ability);
        Ok(id)
    }

    pub fn truth(&self) -> &T {
        &self.truth
    }

    pub fn truth_mut(&mut self) -> &mut T {
        &mut self.truth
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Both stores at once, for driving the multiverse service directly.
    pub fn stores_mut(&mut self) -> (&mut T, &mut G) {
        (&mut self.truth, &mut self.graph)
    }

    pub fn pipeline(&self) -> &EffectPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut EffectPipeline {
        &mut self.pipeline
    }

    /// Process one turn. Player-facing failures come back as a failed
    /// result; a version conflict discards the turn and retries once with
    /// fresh state; anything else discards the turn and surfaces.
    pub fn handle(&mut self, intent: &Intent) -> TurnResult {
        self.session.turn_count += 1;
        info!(turn = self.session.turn_count, intent = intent.kind.name(), "turn start");
        let checkpoint = self.session.clone();

        match self.run_turn(intent) {
            Ok(result) => result,
            Err(EngineError::ConflictState(message)) => {
                debug!(conflict = %message, "conflict, retrying turn once");
                self.session = checkpoint.clone();
                match self.run_turn(intent) {
                    Ok(result) => result,
                    Err(err) => self.failed_turn(err, checkpoint),
                }
            }
            Err(err) => self.failed_turn(err, checkpoint),
        }
    }

    /// One attempt at a turn: resolve against a fresh staged buffer, then
    /// commit it atomically. Session changes only stick once the commit has.
    fn run_turn(&mut self, intent: &Intent) -> EngineResult<TurnResult> {
        self.turn = Transaction::new();
        let result = self.handle_inner(intent)?;

        let tx = std::mem::take(&mut self.turn);
        if !tx.is_empty() {
            self.truth.commit(tx)?;
        }
        if let Some(universe) = result.forked_universe {
            self.session.universe_id = universe;
        }
        Ok(result)
    }

    fn failed_turn(&mut self, err: EngineError, checkpoint: Session) -> TurnResult {
        if !err.is_player_facing() {
            error!(error = %err, "turn failed");
        }
        self.turn = Transaction::new();
        self.session = checkpoint;
        TurnResult {
            result: SkillResult::failure(err.reason()),
            events_created: Vec::new(),
            forked_universe: None,
        }
    }

    fn handle_inner(&mut self, intent: &Intent) -> EngineResult<TurnResult> {
        let context = self.load_context()?;

        match intent.kind {
            IntentKind::Attack => self.resolve_attack_intent(intent, &context),
            IntentKind::Persuade => self.resolve_social(intent, &context, Skill::Persuasion),
            IntentKind::Intimidate => self.resolve_social(intent, &context, Skill::Intimidation),
            IntentKind::Deceive => self.resolve_social(intent, &context, Skill::Deception),
            IntentKind::Search => self.resolve_search(intent, &context),
            IntentKind::Move => self.resolve_move(intent),
            IntentKind::Look => Ok(self.respond(self.describe_scene(&context), Vec::new())),
            IntentKind::Talk => self.resolve_talk(intent, &context),
            IntentKind::Rest => self.resolve_rest(intent),
            IntentKind::UseAbility | IntentKind::CastSpell => self.resolve_ability(intent, &context),
            IntentKind::UseItem => self.resolve_use_item(intent, &context),
            IntentKind::PickUp => self.resolve_pick_up(intent),
            IntentKind::Drop => self.resolve_drop(intent, &context),
            IntentKind::Give => self.resolve_give(intent, &context),
            IntentKind::Fork => self.resolve_fork(intent),
            IntentKind::Wait => self.resolve_wait(),
            IntentKind::Interact => Ok(self.respond(
                SkillResult::neutral("You interact with your surroundings."),
                Vec::new(),
            )),
            IntentKind::AskQuestion => Ok(self.respond(
                SkillResult::neutral("You consider the question."),
                Vec::new(),
            )),
            IntentKind::Unclear => Ok(self.respond(SkillResult::failure("unclear"), Vec::new())),
        }
    }

    // -----------------------------------------------------------------------
    // Context
    // -----------------------------------------------------------------------

    /// Entities LOCATED_IN a location, with the lazy-divergence walk over
    /// the fork ancestry: edges recorded in an ancestor still apply unless
    /// the fork has diverged.
    fn present_at(&mut self, location: EntityId) -> EngineResult<Vec<EntityId>> {
        let chain = {
            let view = StagedTruth::new(&self.truth, &mut self.turn);
            multiverse::lineage(&view, self.session.universe_id)?
        };
        let mut found = Vec::new();
        for universe in chain.iter().rev() {
            for id in self.graph.entities_at_location(location, universe.id)? {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        Ok(found)
    }

    /// An entity's edges, unioned across the fork ancestry (current
    /// universe first).
    fn edges_of(
        &mut self,
        entity: EntityId,
        kind: Option<RelationshipKind>,
    ) -> EngineResult<Vec<Relationship>> {
        let chain = {
            let view = StagedTruth::new(&self.truth, &mut self.turn);
            multiverse::lineage(&view, self.session.universe_id)?
        };
        let mut edges = Vec::new();
        for universe in chain.iter().rev() {
            edges.extend(self.graph.relationships_of(entity, universe.id, kind)?);
        }
        Ok(edges)
    }

    fn load_context(&mut self) -> EngineResult<Context> {
        let actor = self.entity(self.session.actor_id)?;
        let location = self.entity(self.session.location_id)?;
        let location_stats = location
            .location_stats()
            .ok_or_else(|| EngineError::InvalidTarget("session location is not a location".into()))?;

        let mut entities_present = Vec::new();
        for id in self.present_at(location.id)? {
            if id == actor.id {
                continue;
            }
            if let Some(entity) = self.resolve(id)? {
                if entity.active {
                    entities_present.push(summarize(&entity));
                }
            }
        }

        let mut inventory = Vec::new();
        let mut known_entities = Vec::new();
        for edge in self.edges_of(actor.id, None)? {
            if edge.source != actor.id {
                continue;
            }
            if edge.kind.is_inventory() {
                if let Some(item) = self.resolve(edge.target)? {
                    if item.active {
                        inventory.push(summarize(&item));
                    }
                }
            } else if edge.kind.is_social() {
                if let Some(other) = self.resolve(edge.target)? {
                    known_entities.push(KnownEntity {
                        entity: summarize(&other),
                        kind: edge.kind,
                        trust: edge.trust,
                    });
                }
            }
        }

        let recent_events = {
            let view = StagedTruth::new(&self.truth, &mut self.turn);
            view.list_events(self.session.universe_id, usize::MAX, 0)?
                .iter()
                .rev()
                .take(10)
                .rev()
                .map(|e| format!("{:?} ({})", e.event_type, e.outcome))
                .collect()
        };

        Ok(Context {
            universe_id: self.session.universe_id,
            actor: summarize(&actor),
            location: summarize(&location),
            location_type: location_stats.location_type.clone(),
            danger_level: location_stats.danger_level,
            exits: location_stats.exits.keys().cloned().collect(),
            entities_present,
            inventory,
            known_entities,
            recent_events,
        })
    }

    /// Resolve an entity through the staged view, so a turn sees its own
    /// writes.
    fn resolve(&mut self, id: EntityId) -> EngineResult<Option<Entity>> {
        let view = StagedTruth::new(&self.truth, &mut self.turn);
        multiverse::resolve_entity(&view, &self.graph, id, self.session.universe_id)
    }

    fn entity(&mut self, id: EntityId) -> EngineResult<Entity> {
        self.resolve(id)?
            .ok_or_else(|| EngineError::NotFound(format!("entity {id}")))
    }

    fn actor_stats(&mut self) -> EngineResult<CharacterStats> {
        self.entity(self.session.actor_id)?
            .character_stats()
            .cloned()
            .ok_or_else(|| EngineError::InvalidTarget("session actor is not a character".into()))
    }

    /// Find the intent's target among entities present.
    fn resolve_target(&mut self, intent: &Intent, context: &Context) -> EngineResult<Entity> {
        if let Some(id) = intent.target_id {
            return self.entity(id);
        }
        let name = intent
            .target_name
            .as_deref()
            .ok_or_else(|| EngineError::InvalidTarget("no target named".into()))?;
        let lower = name.to_lowercase();
        let found = context
            .entities_present
            .iter()
            .find(|e| e.name.to_lowercase().contains(&lower))
            .ok_or_else(|| EngineError::NotFound(format!("no '{name}' here")))?;
        self.entity(found.id)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn resolve_attack_intent(
        &mut self,
        intent: &Intent,
        context: &Context,
    ) -> EngineResult<TurnResult> {
        let attacker = self.actor_stats()?;
        let target = self.resolve_target(intent, context)?;
        let target_stats = target
            .character_stats()
            .ok_or_else(|| EngineError::InvalidTarget(format!("{} cannot be attacked", target.name)))?;

        let weapon = self.wielded_weapon()?;
        let melee = !weapon.ranged;
        let (advantage, auto_crit) = self.pipeline.attack_advantage_modifier(
            self.session.actor_id,
            target.id,
            self.session.universe_id,
            melee,
        );

        let outcome = resolve_attack(
            &attacker,
            target_stats.ac,
            Cover::None,
            &weapon,
            advantage,
            auto_crit,
            &mut *self.roller,
        )?;

        let mut result = SkillResult {
            success: outcome.hit,
            roll: Some(outcome.attack_roll),
            total: Some(outcome.total_attack),
            dc: Some(outcome.target_ac),
            is_critical: outcome.critical,
            is_fumble: outcome.fumble,
            damage: outcome.damage,
            ..SkillResult::default()
        };

        let mut events = Vec::new();
        let mut event = Event::new(self.session.universe_id, EventType::Attack, self.session.actor_id)
            .with_target(target.id)
            .with_location(self.session.location_id)
            .with_roll(outcome.attack_roll)
            .with_payload("weapon", weapon.name.clone())
            .with_payload("total_attack", outcome.total_attack as i64);

        if outcome.hit {
            let damage = outcome.damage.unwrap_or(0);
            let updated = self.damage_entity(target.id, damage, Some(&mut events))?;
            let hp_after = updated
                .character_stats()
                .map(|s| s.hp_current)
                .unwrap_or(0);
            let died = hp_after == 0;

            event = event
                .with_outcome(if outcome.critical {
                    EventOutcome::StrongHit
                } else {
                    EventOutcome::Success
                })
                .with_payload("damage", damage as i64)
                .with_payload(
                    "damage_type",
                    outcome.damage_type.clone().unwrap_or_default(),
                )
                .with_payload("hp_after", hp_after as i64)
                .with_payload("target_died", i64::from(died));
            if outcome.critical {
                event = event.with_payload("critical", 1);
            }
            result.description = format!(
                "Hit {} for {} damage{}.",
                target.name,
                damage,
                if outcome.critical { " (critical)" } else { "" }
            );
            result.pbta_outcome = Some(
                if outcome.critical { "strong_hit" } else { "success" }.to_string(),
            );
            if died {
                events.push(
                    Event::new(self.session.universe_id, EventType::Death, target.id)
                        .with_location(self.session.location_id)
                        .with_outcome(EventOutcome::Neutral)
                        .with_payload("slain_by", self.session.actor_id.0.to_string()),
                );
                result.state_changes.push(format!("{} died", target.name));
            }
        } else {
            event = event.with_outcome(EventOutcome::Miss);
            result.description = format!(
                "Missed {} ({} vs AC {}).",
                target.name, outcome.total_attack, outcome.target_ac
            );
            result.pbta_outcome = Some("miss".to_string());
        }
        events.insert(0, event);

        if !outcome.hit {
            self.run_gm_move(&mut result, context, &mut events, true)?;
        } else {
            self.session.recent_soft_moves = 0;
        }

        let ids = self.record(events)?;
        Ok(TurnResult {
            result,
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_social(
        &mut self,
        intent: &Intent,
        context: &Context,
        skill: Skill,
    ) -> EngineResult<TurnResult> {
        let stats = self.actor_stats()?;
        let dc = intent.difficulty.unwrap_or(12);
        let outcome = skill_check(&stats, skill, dc, Default::default(), &mut *self.roller);

        let pbta = classify(outcome.total, Some(dc), outcome.roll == 20, outcome.roll == 1);
        let mut result = SkillResult {
            success: outcome.success,
            roll: Some(outcome.roll),
            total: Some(outcome.total),
            dc: Some(dc),
            is_critical: outcome.roll == 20,
            is_fumble: outcome.roll == 1,
            pbta_outcome: Some(pbta_name(pbta).to_string()),
            description: format!(
                "{} check: {} vs DC {} (margin {}).",
                skill.name(),
                outcome.total,
                dc,
                outcome.margin
            ),
            ..SkillResult::default()
        };

        let event_type = match skill {
            Skill::Persuasion => EventType::Persuasion,
            Skill::Intimidation => EventType::Intimidation,
            Skill::Deception => EventType::Deception,
            _ => EventType::SkillCheck,
        };
        let mut events = vec![Event::new(self.session.universe_id, event_type, self.session.actor_id)
            .with_location(self.session.location_id)
            .with_roll(outcome.roll)
            .with_outcome(pbta_event_outcome(pbta))
            .with_payload("skill", skill.name())
            .with_payload("dc", dc as i64)
            .with_payload("total", outcome.total as i64)
            .with_payload("margin", outcome.margin as i64)];

        self.apply_pbta(&mut result, context, &mut events, intent.kind, pbta)?;

        let ids = self.record(events)?;
        Ok(TurnResult {
            result,
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_search(&mut self, intent: &Intent, context: &Context) -> EngineResult<TurnResult> {
        let stats = self.actor_stats()?;
        let dc = intent.difficulty.unwrap_or(12);
        let outcome = skill_check(&stats, Skill::Investigation, dc, Default::default(), &mut *self.roller);
        let pbta = classify(outcome.total, Some(dc), outcome.roll == 20, outcome.roll == 1);

        let mut result = SkillResult {
            success: outcome.success,
            roll: Some(outcome.roll),
            total: Some(outcome.total),
            dc: Some(dc),
            pbta_outcome: Some(pbta_name(pbta).to_string()),
            description: if outcome.success {
                "Your search turns something up.".to_string()
            } else {
                "You find nothing of note.".to_string()
            },
            ..SkillResult::default()
        };

        let mut events = vec![Event::new(self.session.universe_id, EventType::SkillCheck, self.session.actor_id)
            .with_location(self.session.location_id)
            .with_roll(outcome.roll)
            .with_outcome(pbta_event_outcome(pbta))
            .with_payload("skill", "investigation")
            .with_payload("dc", dc as i64)
            .with_payload("total", outcome.total as i64)];

        self.apply_pbta(&mut result, context, &mut events, intent.kind, pbta)?;

        let ids = self.record(events)?;
        Ok(TurnResult {
            result,
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_move(&mut self, intent: &Intent) -> EngineResult<TurnResult> {
        let destination = intent
            .destination
            .as_deref()
            .ok_or_else(|| EngineError::BadInput("no destination named".into()))?;
        let location = self.entity(self.session.location_id)?;
        let exits = &location
            .location_stats()
            .ok_or_else(|| EngineError::InvalidTarget("not in a location".into()))?
            .exits;

        let lower = destination.to_lowercase();
        let target_id = exits
            .get(&lower)
            .copied()
            .ok_or_else(|| EngineError::BadInput(format!("you can't go {destination} from here")))?;
        let target = self.entity(target_id)?;

        self.graph.create_relationship(&Relationship::new(
            self.session.universe_id,
            self.session.actor_id,
            RelationshipKind::LocatedIn,
            target_id,
        ))?;
        let from = self.session.location_id;
        self.session.location_id = target_id;

        let event = Event::new(self.session.universe_id, EventType::Travel, self.session.actor_id)
            .with_location(target_id)
            .with_outcome(EventOutcome::Success)
            .with_payload("from_location_id", from.0.to_string())
            .with_payload("to_location_id", target_id.0.to_string())
            .with_payload("direction", lower);
        let ids = self.record(vec![event])?;

        Ok(TurnResult {
            result: SkillResult::neutral(format!("You go {destination} to {}.", target.name)),
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_talk(&mut self, intent: &Intent, context: &Context) -> EngineResult<TurnResult> {
        let target = self.resolve_target(intent, context).ok();
        let dialogue = intent.dialogue.clone().unwrap_or_default();

        let mut event = Event::new(self.session.universe_id, EventType::Dialogue, self.session.actor_id)
            .with_location(self.session.location_id)
            .with_payload("text", dialogue.clone());
        if let Some(target) = &target {
            event = event.with_target(target.id);
        }
        let ids = self.record(vec![event])?;

        let description = match target {
            Some(listener) => format!("You say to {}: \"{dialogue}\"", listener.name),
            None => format!("You say: \"{dialogue}\""),
        };
        Ok(TurnResult {
            result: SkillResult::neutral(description),
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_rest(&mut self, intent: &Intent) -> EngineResult<TurnResult> {
        let long = intent.rest_kind.as_deref() == Some("long");
        let mut outcome = None;
        let outcome_ref = &mut outcome;
        let roller = &mut self.roller;
        let mut view = StagedTruth::new(&self.truth, &mut self.turn);
        let updated = multiverse::mutate_entity(
            &mut view,
            &mut self.graph,
            self.session.actor_id,
            self.session.universe_id,
            |entity| {
                if let Some(stats) = entity.character_stats_mut() {
                    *outcome_ref = Some(if long {
                        rest::long_rest(stats)
                    } else {
                        rest::short_rest(stats, 1, &mut **roller)
                    });
                }
            },
        )?;
        let outcome = outcome
            .ok_or_else(|| EngineError::InvalidTarget("only characters can rest".into()))?;
        let hp_after = updated.character_stats().map(|s| s.hp_current).unwrap_or(0);

        let event = Event::new(
            self.session.universe_id,
            if long { EventType::LongRest } else { EventType::ShortRest },
            self.session.actor_id,
        )
        .with_location(self.session.location_id)
        .with_outcome(EventOutcome::Success)
        .with_payload("hp_healed", outcome.hp_healed as i64)
        .with_payload("hp_after", hp_after as i64)
        .with_payload("hit_dice_spent", outcome.hit_dice_spent as i64);
        let ids = self.record(vec![event])?;

        let mut result = SkillResult::neutral(format!(
            "You complete a {} rest and recover {} HP.",
            outcome.rest_kind, outcome.hp_healed
        ));
        result.healing = Some(outcome.hp_healed);
        result.state_changes = outcome.resources_restored;
        Ok(TurnResult {
            result,
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_ability(&mut self, intent: &Intent, context: &Context) -> EngineResult<TurnResult> {
        let ability_id = intent
            .ability_id
            .ok_or_else(|| EngineError::BadInput("no ability named".into()))?;
        let ability = self
            .abilities
            .get(&ability_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound("unknown ability".into()))?;

        if let Some(overlay) = &self.overlay {
            overlay.check_source(ability.source)?;
        }

        // Resource debit, refused before any mutation.
        let mut breaking_point = false;
        let debit_note = self.debit_resources(&ability, &mut breaking_point)?;

        let actor_stats = self.actor_stats()?;
        let save_dc = 8
            + actor_stats.proficiency_bonus()
            + actor_stats.abilities.modifier(casting_ability(ability.source));

        let targets: Vec<TargetRef> = match self.resolve_target(intent, context) {
            Ok(target) => {
                let modifier = ability
                    .damage
                    .as_ref()
                    .and_then(|d| d.save_ability)
                    .or_else(|| ability.conditions.first().and_then(|c| c.save_ability))
                    .map(|save| {
                        target
                            .character_stats()
                            .map(|s| s.abilities.modifier(save))
                            .unwrap_or(0)
                    })
                    .unwrap_or(0);
                vec![TargetRef {
                    id: target.id,
                    save_modifier: modifier,
                }]
            }
            Err(_) => vec![TargetRef {
                id: self.session.actor_id,
                save_modifier: 0,
            }],
        };

        let overlay = self.overlay.clone();
        let report = self.pipeline.apply_ability_effects(
            &ability,
            self.session.actor_id,
            save_dc,
            &targets,
            self.session.universe_id,
            overlay.as_ref(),
            &mut *self.roller,
        )?;

        let mut events = vec![Event::new(
            self.session.universe_id,
            EventType::ResourceUsed,
            self.session.actor_id,
        )
        .with_location(self.session.location_id)
        .with_outcome(EventOutcome::Success)
        .with_payload("ability", ability.name.clone())
        .with_payload("mechanism", debit_note.clone())];

        if breaking_point {
            events.push(
                Event::new(self.session.universe_id, EventType::BreakingPoint, self.session.actor_id)
                    .with_outcome(EventOutcome::Neutral)
                    .with_payload("ability", ability.name.clone()),
            );
        }

        let mut total_damage = 0;
        for (target_id, amount) in &report.damage_dealt {
            total_damage += amount;
            let updated = self.damage_entity(*target_id, *amount, Some(&mut events))?;
            let hp_after = updated.character_stats().map(|s| s.hp_current).unwrap_or(0);
            events.push(
                Event::new(self.session.universe_id, EventType::Damage, self.session.actor_id)
                    .with_target(*target_id)
                    .with_outcome(EventOutcome::Hit)
                    .with_payload("ability", ability.name.clone())
                    .with_payload("damage", *amount as i64)
                    .with_payload("hp_after", hp_after as i64),
            );
        }

        let mut total_healing = 0;
        for (target_id, amount) in &report.healing_done {
            total_healing += amount;
            let mut view = StagedTruth::new(&self.truth, &mut self.turn);
            let updated = multiverse::mutate_entity(
                &mut view,
                &mut self.graph,
                *target_id,
                self.session.universe_id,
                |entity| {
                    if let Some(stats) = entity.character_stats_mut() {
                        stats.heal(*amount);
                    }
                },
            )?;
            let hp_after = updated.character_stats().map(|s| s.hp_current).unwrap_or(0);
            events.push(
                Event::new(self.session.universe_id, EventType::Heal, self.session.actor_id)
                    .with_target(*target_id)
                    .with_outcome(EventOutcome::Success)
                    .with_payload("healing", *amount as i64)
                    .with_payload("hp_after", hp_after as i64),
            );
        }

        for (target_id, condition) in &report.conditions_applied {
            events.push(
                Event::new(self.session.universe_id, EventType::ConditionApplied, self.session.actor_id)
                    .with_target(*target_id)
                    .with_outcome(EventOutcome::Success)
                    .with_payload("condition", condition.name())
                    .with_payload("ability", ability.name.clone()),
            );
        }

        let mut parts = vec![format!("Used {}.", ability.name)];
        if total_damage > 0 {
            parts.push(format!("Dealt {total_damage} damage."));
        }
        if total_healing > 0 {
            parts.push(format!("Healed {total_healing} HP."));
        }
        if !report.conditions_applied.is_empty() {
            let names: Vec<&str> = report
                .conditions_applied
                .iter()
                .map(|(_, c)| c.name())
                .collect();
            parts.push(format!("Applied: {}.", names.join(", ")));
        }
        if report.concentration_started {
            parts.push("Concentrating.".to_string());
        }

        let result = SkillResult {
            success: true,
            damage: (total_damage > 0).then_some(total_damage),
            healing: (total_healing > 0).then_some(total_healing),
            conditions_applied: report
                .conditions_applied
                .iter()
                .map(|(_, c)| c.name().to_string())
                .collect(),
            description: parts.join(" "),
            ..SkillResult::default()
        };

        let ids = self.record(events)?;
        Ok(TurnResult {
            result,
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_use_item(&mut self, intent: &Intent, context: &Context) -> EngineResult<TurnResult> {
        let name = intent
            .target_name
            .as_deref()
            .ok_or_else(|| EngineError::BadInput("no item named".into()))?;
        let lower = name.to_lowercase();
        let item = context
            .inventory
            .iter()
            .find(|i| i.name.to_lowercase().contains(&lower))
            .ok_or_else(|| EngineError::NotFound(format!("you are not carrying '{name}'")))?
            .clone();

        let full = self.entity(item.id)?;
        let consumable = full.item_stats().is_some_and(|s| s.consumable);
        if consumable {
            let mut view = StagedTruth::new(&self.truth, &mut self.turn);
            multiverse::mutate_entity(
                &mut view,
                &mut self.graph,
                item.id,
                self.session.universe_id,
                |entity| entity.active = false,
            )?;
        }

        let event = Event::new(self.session.universe_id, EventType::ItemUse, self.session.actor_id)
            .with_target(item.id)
            .with_location(self.session.location_id)
            .with_outcome(EventOutcome::Success)
            .with_payload("item", item.name.clone())
            .with_payload("consumed", i64::from(consumable));
        let ids = self.record(vec![event])?;

        Ok(TurnResult {
            result: SkillResult::neutral(format!("You use the {}.", item.name)),
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_pick_up(&mut self, intent: &Intent) -> EngineResult<TurnResult> {
        let name = intent
            .target_name
            .as_deref()
            .ok_or_else(|| EngineError::BadInput("no item named".into()))?;
        let item = {
            let view = StagedTruth::new(&self.truth, &mut self.turn);
            multiverse::resolve_by_name(&view, &self.graph, name, self.session.universe_id)?
        }
        .filter(|e| e.is_item() && e.active)
        .ok_or_else(|| EngineError::NotFound(format!("no '{name}' here")))?;

        // Must be in this location (contained or lying here).
        let here = self
            .graph
            .relationships_of(item.id, self.session.universe_id, None)?
            .iter()
            .any(|r| {
                (r.kind == RelationshipKind::Contains && r.source == self.session.location_id)
                    || (r.kind == RelationshipKind::LocatedIn && r.target == self.session.location_id)
            });
        if !here {
            return Err(EngineError::InvalidTarget(format!("the {name} is not here")));
        }

        for edge in self
            .graph
            .relationships_of(item.id, self.session.universe_id, None)?
        {
            if edge.kind == RelationshipKind::Contains || edge.kind == RelationshipKind::LocatedIn {
                self.graph.delete_relationship(edge.id)?;
            }
        }
        self.graph.create_relationship(&Relationship::new(
            self.session.universe_id,
            self.session.actor_id,
            RelationshipKind::Carries,
            item.id,
        ))?;

        let event = Event::new(self.session.universe_id, EventType::ItemPickup, self.session.actor_id)
            .with_target(item.id)
            .with_location(self.session.location_id)
            .with_outcome(EventOutcome::Success)
            .with_payload("item", item.name.clone());
        let ids = self.record(vec![event])?;

        Ok(TurnResult {
            result: SkillResult::neutral(format!("You pick up the {}.", item.name)),
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_drop(&mut self, intent: &Intent, context: &Context) -> EngineResult<TurnResult> {
        let name = intent
            .target_name
            .as_deref()
            .ok_or_else(|| EngineError::BadInput("no item named".into()))?;
        let lower = name.to_lowercase();
        let item = context
            .inventory
            .iter()
            .find(|i| i.name.to_lowercase().contains(&lower))
            .ok_or_else(|| EngineError::NotFound(format!("you are not carrying '{name}'")))?
            .clone();

        for edge in self
            .graph
            .relationships_of(item.id, self.session.universe_id, None)?
        {
            if edge.kind.is_inventory() && edge.source == self.session.actor_id {
                self.graph.delete_relationship(edge.id)?;
            }
        }
        self.graph.create_relationship(&Relationship::new(
            self.session.universe_id,
            self.session.location_id,
            RelationshipKind::Contains,
            item.id,
        ))?;

        let event = Event::new(self.session.universe_id, EventType::ItemDrop, self.session.actor_id)
            .with_target(item.id)
            .with_location(self.session.location_id)
            .with_outcome(EventOutcome::Success)
            .with_payload("item", item.name.clone());
        let ids = self.record(vec![event])?;

        Ok(TurnResult {
            result: SkillResult::neutral(format!("You drop the {}.", item.name)),
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_give(&mut self, intent: &Intent, context: &Context) -> EngineResult<TurnResult> {
        let recipient = self.resolve_target(intent, context)?;
        let item_name = intent
            .dialogue
            .as_deref()
            .or(intent.destination.as_deref())
            .ok_or_else(|| EngineError::BadInput("no item named to give".into()))?;
        let lower = item_name.to_lowercase();
        let item = context
            .inventory
            .iter()
            .find(|i| i.name.to_lowercase().contains(&lower))
            .ok_or_else(|| EngineError::NotFound(format!("you are not carrying '{item_name}'")))?
            .clone();

        for edge in self
            .graph
            .relationships_of(item.id, self.session.universe_id, None)?
        {
            if edge.kind.is_inventory() && edge.source == self.session.actor_id {
                self.graph.delete_relationship(edge.id)?;
            }
        }
        self.graph.create_relationship(&Relationship::new(
            self.session.universe_id,
            recipient.id,
            RelationshipKind::Carries,
            item.id,
        ))?;

        let event = Event::new(self.session.universe_id, EventType::ItemTransfer, self.session.actor_id)
            .with_target(recipient.id)
            .with_location(self.session.location_id)
            .with_outcome(EventOutcome::Success)
            .with_payload("item", item.name.clone())
            .with_payload("item_id", item.id.0.to_string());
        let ids = self.record(vec![event])?;

        Ok(TurnResult {
            result: SkillResult::neutral(format!("You give the {} to {}.", item.name, recipient.name)),
            events_created: ids,
            forked_universe: None,
        })
    }

    fn resolve_fork(&mut self, intent: &Intent) -> EngineResult<TurnResult> {
        let reason = intent
            .fork_reason
            .clone()
            .or_else(|| Some(intent.original_input.clone()))
            .filter(|r| !r.is_empty())
            .ok_or_else(|| EngineError::BadInput("no fork reason given".into()))?;

        let mut view = StagedTruth::new(&self.truth, &mut self.turn);
        let fork_point = view
            .list_events(self.session.universe_id, usize::MAX, 0)?
            .last()
            .map(|e| e.id);
        let outcome = multiverse::fork_universe(
            &mut view,
            self.session.universe_id,
            &format!("what-if-{}", self.session.turn_count),
            &reason,
            self.session.actor_id,
            fork_point,
        )?;

        // The session moves into the fork once the turn commits.
        Ok(TurnResult {
            result: SkillResult::neutral(format!("Reality splits: {reason}")),
            events_created: vec![outcome.fork_event],
            forked_universe: Some(outcome.universe.id),
        })
    }

    fn resolve_wait(&mut self) -> EngineResult<TurnResult> {
        let event = Event::new(self.session.universe_id, EventType::TimePassage, self.session.actor_id)
            .with_location(self.session.location_id)
            .with_outcome(EventOutcome::Neutral);
        let ids = self.record(vec![event])?;
        Ok(TurnResult {
            result: SkillResult::neutral("Time passes."),
            events_created: ids,
            forked_universe: None,
        })
    }

    // -----------------------------------------------------------------------
    // Solo combat
    // -----------------------------------------------------------------------

    /// Process the start of a solo combat round: +1 momentum, the fray die
    /// against lesser enemies, cooldown recharges, and fresh action flags.
    /// Stages like a turn and commits atomically at the end.
    pub fn start_solo_round(&mut self) -> EngineResult<SoloRoundReport> {
        let checkpoint = self.session.clone();
        self.turn = Transaction::new();
        match self.solo_round_inner() {
            Ok(report) => {
                let tx = std::mem::take(&mut self.turn);
                if let Err(err) = self.truth.commit(tx) {
                    self.session = checkpoint;
                    return Err(err.into());
                }
                Ok(report)
            }
            Err(err) => {
                self.turn = Transaction::new();
                self.session = checkpoint;
                Err(err)
            }
        }
    }

    fn solo_round_inner(&mut self) -> EngineResult<SoloRoundReport> {
        self.session.in_combat = true;
        self.session.combat_round += 1;
        let round = self.session.combat_round;
        let mut report = SoloRoundReport {
            round,
            ..SoloRoundReport::default()
        };
        let mut events = Vec::new();

        let actor = self.entity(self.session.actor_id)?;
        let actor_stats = actor
            .character_stats()
            .ok_or_else(|| EngineError::InvalidTarget("actor is not a character".into()))?;
        let level = actor_stats.level;

        // Enemies present: hostile characters at this location.
        let mut enemies = Vec::new();
        for id in self.present_at(self.session.location_id)? {
            if id == self.session.actor_id {
                continue;
            }
            if let Some(entity) = self.resolve(id)? {
                if entity.active {
                    if let Some(stats) = entity.character_stats() {
                        enemies.push((entity.id, stats.hit_dice_rating));
                    }
                }
            }
        }

        let fray = roll_fray(
            level,
            &enemies,
            &FrayConfig {
                mooks_only: true,
                can_split: false,
            },
            &mut *self.roller,
        );
        report.fray_damage = fray.damage;

        for (enemy_id, amount) in &fray.damage_per_target {
            let updated = self.damage_entity(*enemy_id, *amount, None)?;
            let hp_after = updated.character_stats().map(|s| s.hp_current).unwrap_or(0);
            let died = hp_after == 0;
            events.push(
                Event::new(self.session.universe_id, EventType::CombatRound, self.session.actor_id)
                    .with_target(*enemy_id)
                    .with_location(self.session.location_id)
                    .with_outcome(EventOutcome::Hit)
                    .with_payload("fray_die", format!("d{}", fray.die_sides))
                    .with_payload("fray_damage", *amount as i64)
                    .with_payload("hp_after", hp_after as i64)
                    .with_payload("target_died", i64::from(died)),
            );
            if died {
                report.fray_kills.push(*enemy_id);
                events.push(
                    Event::new(self.session.universe_id, EventType::Death, *enemy_id)
                        .with_location(self.session.location_id)
                        .with_payload("slain_by", "fray"),
                );
            }
        }

        // Momentum, recharges, and action flags live on the actor's pool.
        let mut recharged = Vec::new();
        let mut momentum_gained = 0;
        {
            let roller = &mut self.roller;
            let recharged_ref = &mut recharged;
            let momentum_ref = &mut momentum_gained;
            let mut view = StagedTruth::new(&self.truth, &mut self.turn);
            multiverse::mutate_entity(
                &mut view,
                &mut self.graph,
                self.session.actor_id,
                self.session.universe_id,
                |entity| {
                    if let Some(stats) = entity.character_stats_mut() {
                        if let Some(pool) = &mut stats.resources.stress_momentum {
                            *momentum_ref = pool.add_momentum(1);
                        }
                        for (name, cooldown) in &mut stats.resources.cooldowns {
                            if cooldown.current_uses < cooldown.max_uses
                                && !cooldown.recharge_on.is_empty()
                            {
                                let roll = roller.roll_die(cooldown.recharge_die);
                                if cooldown.recharge_on.contains(&roll) {
                                    cooldown.restore(1);
                                    recharged_ref.push(name.clone());
                                }
                            }
                        }
                        stats.resources.solo.start_round(1);
                    }
                },
            )?;
        }
        report.momentum_gained = momentum_gained;
        report.cooldowns_recharged = recharged;

        // Tick the actor's own conditions and effects for the new round.
        let actor_saves = self.actor_stats()?;
        self.pipeline.tick_round(
            self.session.actor_id,
            self.session.universe_id,
            round,
            |ability| actor_saves.abilities.modifier(ability),
            &mut *self.roller,
        );

        report.events = self.record(events)?;
        Ok(report)
    }

    /// Apply damage from outside the player's turn (an NPC's attack, a trap,
    /// the narrative layer). Runs the full damage path — defy death,
    /// momentum reset, concentration — staged and committed like a turn.
    pub fn apply_external_damage(
        &mut self,
        target: EntityId,
        amount: i32,
        source: &str,
    ) -> EngineResult<Entity> {
        self.turn = Transaction::new();
        let result = self.external_damage_inner(target, amount, source);
        if result.is_err() {
            self.turn = Transaction::new();
        }
        result
    }

    fn external_damage_inner(
        &mut self,
        target: EntityId,
        amount: i32,
        source: &str,
    ) -> EngineResult<Entity> {
        let mut events = Vec::new();
        let updated = self.damage_entity(target, amount, Some(&mut events))?;
        let hp_after = updated.character_stats().map(|s| s.hp_current).unwrap_or(0);
        events.insert(
            0,
            Event::new(self.session.universe_id, EventType::Damage, target)
                .with_target(target)
                .with_outcome(EventOutcome::Hit)
                .with_payload("source", source)
                .with_payload("damage", amount as i64)
                .with_payload("hp_after", hp_after as i64),
        );
        self.record(events)?;
        let tx = std::mem::take(&mut self.turn);
        self.truth.commit(tx)?;
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// Apply damage to an entity, running the defy-death pre-check when the
    /// hit would drop a character to 0 and breaking concentration on damage.
    fn damage_entity(
        &mut self,
        target: EntityId,
        amount: i32,
        events: Option<&mut Vec<Event>>,
    ) -> EngineResult<Entity> {
        self.pipeline
            .record_damage(target, self.session.universe_id, amount);
        let damage_this_round = self
            .pipeline
            .state_ref(target, self.session.universe_id)
            .map(|s| s.damage_this_round)
            .unwrap_or(amount);

        let mut defied = false;
        let mut local_events = Vec::new();
        // The session actor at 0 HP goes to death saves; anyone else dies.
        let is_actor = target == self.session.actor_id;
        let roller = &mut self.roller;
        let mut view = StagedTruth::new(&self.truth, &mut self.turn);
        let updated = multiverse::mutate_entity(
            &mut view,
            &mut self.graph,
            target,
            self.session.universe_id,
            |entity| {
                let Some(stats) = entity.character_stats_mut() else {
                    return;
                };
                if amount > 0 {
                    if let Some(pool) = &mut stats.resources.stress_momentum {
                        pool.reset_momentum();
                    }
                }
                let would_drop = stats.hp_current + stats.hp_temp <= amount;
                if would_drop && stats.resources.defy_death.uses_remaining() > 0 {
                    let con = stats.abilities.modifier(Ability::Constitution);
                    let outcome = defy_death(
                        con,
                        damage_this_round,
                        stats.resources.defy_death.uses_today,
                        stats.resources.defy_death.max_uses,
                        &DefyDeathConfig::default(),
                        &mut **roller,
                    );
                    if outcome.survived {
                        stats.resources.defy_death.uses_today += 1;
                        stats.take_damage(amount);
                        stats.hp_current = 1;
                        defied = true;
                        return;
                    }
                }
                stats.take_damage(amount);
                let now_dead = stats.hp_current == 0 && !is_actor;
                if now_dead {
                    entity.active = false;
                }
            },
        )?;

        if defied {
            let exhaustion =
                ConditionInstance::new(target, self.session.universe_id, ConditionType::Exhaustion);
            self.pipeline
                .state(target, self.session.universe_id)
                .add_condition(exhaustion);
            local_events.push(
                Event::new(self.session.universe_id, EventType::ConditionApplied, target)
                    .with_outcome(EventOutcome::Success)
                    .with_payload("condition", "exhaustion")
                    .with_payload("defy_death", 1),
            );
        }

        // Concentration survives only a CON save.
        let con_modifier = updated
            .character_stats()
            .map(|s| {
                let mut modifier = s.abilities.modifier(Ability::Constitution);
                if s.save_proficiencies.contains(&Ability::Constitution) {
                    modifier += s.proficiency_bonus();
                }
                modifier
            })
            .unwrap_or(0);
        if let Some(check) = self.pipeline.check_concentration(
            target,
            self.session.universe_id,
            amount,
            con_modifier,
            &mut *self.roller,
        ) {
            if !check.maintained {
                local_events.push(
                    Event::new(self.session.universe_id, EventType::ConcentrationBroken, target)
                        .with_outcome(EventOutcome::Fail)
                        .with_roll(check.roll)
                        .with_payload("dc", check.dc as i64)
                        .with_payload("total", check.total as i64),
                );
            }
        }

        match events {
            Some(sink) => sink.extend(local_events),
            None => {
                self.record(local_events)?;
            }
        }
        Ok(updated)
    }

    /// Consume the resources an ability costs. Fails without mutating when
    /// the pool cannot pay.
    fn debit_resources(
        &mut self,
        ability: &AbilityDef,
        breaking_point: &mut bool,
    ) -> EngineResult<String> {
        let stats = self.actor_stats()?;
        let pool = &stats.resources;

        // Check first against a read-only copy, then apply.
        let note = match &ability.mechanism {
            Mechanism::Slots { level } => {
                if !pool.has_spell_slot(*level) {
                    return Err(EngineError::InsufficientResource(format!(
                        "no level {level} spell slots"
                    )));
                }
                format!("spell slot (level {level})")
            }
            Mechanism::Cooldown { .. } => {
                let tracker = pool.cooldowns.get(&ability.name);
                if tracker.is_some_and(|t| !t.has_uses()) {
                    return Err(EngineError::InsufficientResource(format!(
                        "{} has no uses remaining",
                        ability.name
                    )));
                }
                "cooldown use".to_string()
            }
            Mechanism::UsageDie { .. } => {
                let die = pool
                    .usage_dice
                    .get(&ability.name)
                    .ok_or_else(|| {
                        EngineError::InsufficientResource(format!("no usage die for {}", ability.name))
                    })?;
                if die.depleted {
                    return Err(EngineError::InsufficientResource(format!(
                        "{} usage die is depleted",
                        ability.name
                    )));
                }
                "usage die".to_string()
            }
            Mechanism::Momentum { cost } => {
                let available = pool.stress_momentum.as_ref().map(|p| p.momentum).unwrap_or(0);
                if available < *cost {
                    return Err(EngineError::InsufficientResource(format!(
                        "insufficient momentum ({available}/{cost})"
                    )));
                }
                format!("{cost} momentum")
            }
            Mechanism::Stress { cost } => format!("{cost} stress"),
            Mechanism::Free => "free".to_string(),
        };

        let mechanism = ability.mechanism.clone();
        let name = ability.name.clone();
        let overlay = self.overlay.clone();
        let roller = &mut self.roller;
        let broke = breaking_point;
        let mut view = StagedTruth::new(&self.truth, &mut self.turn);
        multiverse::mutate_entity(
            &mut view,
            &mut self.graph,
            self.session.actor_id,
            self.session.universe_id,
            |entity| {
                let Some(stats) = entity.character_stats_mut() else {
                    return;
                };
                match &mechanism {
                    Mechanism::Slots { level } => {
                        stats.resources.use_spell_slot(*level);
                    }
                    Mechanism::Cooldown { .. } => {
                        if let Some(tracker) = stats.resources.cooldowns.get_mut(&name) {
                            tracker.consume();
                        }
                    }
                    Mechanism::UsageDie { .. } => {
                        if let Some(die) = stats.resources.usage_dice.get_mut(&name) {
                            let roll = roller.roll_die(die.sides());
                            if die.degrades_on(roll) {
                                die.degrade();
                            }
                        }
                    }
                    Mechanism::Momentum { cost } => {
                        if let Some(pool) = &mut stats.resources.stress_momentum {
                            pool.spend_momentum(*cost);
                        }
                    }
                    Mechanism::Stress { cost } => {
                        let cost = overlay
                            .as_ref()
                            .map(|o| o.adjust_stress(*cost))
                            .unwrap_or(*cost);
                        let pool = stats
                            .resources
                            .stress_momentum
                            .get_or_insert_with(Default::default);
                        *broke = pool.add_stress(cost).breaking_point;
                    }
                    Mechanism::Free => {}
                }
            },
        )?;

        Ok(note)
    }

    /// The equipped weapon (WIELDS edge), or bare hands.
    fn wielded_weapon(&mut self) -> EngineResult<Weapon> {
        for edge in self.edges_of(self.session.actor_id, Some(RelationshipKind::Wields))? {
            if edge.source != self.session.actor_id {
                continue;
            }
            if let Some(item) = self.resolve(edge.target)? {
                if let Some(stats) = item.item_stats() {
                    if let Some(dice) = &stats.damage_dice {
                        let mut weapon = Weapon::new(
                            item.name.to_lowercase(),
                            dice.clone(),
                            stats.damage_type.clone().unwrap_or_else(|| "bludgeoning".into()),
                        );
                        weapon.finesse = stats.finesse;
                        weapon.ranged = stats.ranged;
                        return Ok(weapon);
                    }
                }
            }
        }
        Ok(Weapon::new("unarmed strike", "1d4", "bludgeoning"))
    }

    /// PbtA phase for check-shaped results: strong hits gain a bonus, weak
    /// hits a complication, misses a GM move.
    fn apply_pbta(
        &mut self,
        result: &mut SkillResult,
        context: &Context,
        events: &mut Vec<Event>,
        intent_kind: IntentKind,
        outcome: PbtaOutcome,
    ) -> EngineResult<()> {
        match outcome {
            PbtaOutcome::StrongHit => {
                let bonus = strong_hit_bonus(intent_kind.name());
                result.strong_hit_bonus = Some(bonus.to_string());
                result.description = format!("{} {bonus}", result.description);
                self.session.recent_soft_moves = 0;
            }
            PbtaOutcome::WeakHit => {
                let complication = weak_hit_complication(intent_kind.name());
                result.weak_hit_complication = Some(complication.to_string());
                result.description = format!("{} {complication}", result.description);
            }
            PbtaOutcome::Miss => {
                self.run_gm_move(result, context, events, false)?;
            }
        }
        Ok(())
    }

    /// Select and execute a GM move for a miss, folding its effects into the
    /// result.
    fn run_gm_move(
        &mut self,
        result: &mut SkillResult,
        context: &Context,
        events: &mut Vec<Event>,
        in_combat: bool,
    ) -> EngineResult<()> {
        let gm_move = select_gm_move(MoveContext {
            danger_level: context.danger_level,
            in_combat: in_combat || self.session.in_combat,
            recent_soft_moves: self.session.recent_soft_moves,
            recent_events: context.recent_events.len() as u32,
        });
        if gm_move.is_hard {
            self.session.recent_soft_moves = 0;
        } else {
            self.session.recent_soft_moves += 1;
        }

        let setting = MoveSetting {
            universe: self.session.universe_id,
            actor: self.session.actor_id,
            location: self.session.location_id,
            location_name: context.location.name.clone(),
            location_type: context.location_type.clone(),
            danger_level: context.danger_level,
            inventory: context
                .inventory
                .iter()
                .map(|i| (i.id, i.name.clone()))
                .collect(),
            recent_events: context.recent_events.len() as u32,
        };

        let report = {
            let mut view = StagedTruth::new(&self.truth, &mut self.turn);
            execute_gm_move(
                &gm_move,
                &setting,
                &mut view,
                &mut self.graph,
                self.llm.as_deref_mut(),
            )?
        };

        if let Some(damage) = report.damage_to_actor {
            let updated = self.damage_entity(self.session.actor_id, damage, Some(events))?;
            let hp_after = updated.character_stats().map(|s| s.hp_current).unwrap_or(0);
            events.push(
                Event::new(self.session.universe_id, EventType::Damage, self.session.actor_id)
                    .with_target(self.session.actor_id)
                    .with_outcome(EventOutcome::Fail)
                    .with_payload("gm_move", gm_move.move_type.name())
                    .with_payload("damage", damage as i64)
                    .with_payload("hp_after", hp_after as i64),
            );
            result.damage = Some(result.damage.unwrap_or(0) + damage);
        }

        events.push(
            Event::new(self.session.universe_id, EventType::GmMove, self.session.actor_id)
                .with_location(self.session.location_id)
                .with_outcome(EventOutcome::Neutral)
                .with_payload("move_type", gm_move.move_type.name())
                .with_payload("used_fallback", i64::from(report.used_fallback)),
        );

        result.pbta_outcome = Some("miss".to_string());
        result.gm_move_type = Some(gm_move.move_type.name().to_string());
        result.gm_move_description = Some(report.narrative.clone());
        result.entities_created.extend(report.entities_created);
        result.state_changes.extend(report.state_changes);
        result.description = format!("{} {}", result.description, report.narrative);
        Ok(())
    }

    fn describe_scene(&self, context: &Context) -> SkillResult {
        let mut parts = vec![format!("You are in {}.", context.location.name)];
        if !context.entities_present.is_empty() {
            let names: Vec<&str> = context
                .entities_present
                .iter()
                .map(|e| e.name.as_str())
                .collect();
            parts.push(format!("You see: {}.", names.join(", ")));
        }
        if !context.exits.is_empty() {
            parts.push(format!("Exits: {}.", context.exits.join(", ")));
        }
        SkillResult::neutral(parts.join(" "))
    }

    fn respond(&self, result: SkillResult, events: Vec<EventId>) -> TurnResult {
        TurnResult {
            result,
            events_created: events,
            forked_universe: None,
        }
    }

    /// Stage a turn's events into the running transaction. Nothing reaches
    /// the store until the turn commits as a whole.
    fn record(&mut self, events: Vec<Event>) -> EngineResult<Vec<EventId>> {
        let ids: Vec<EventId> = events.iter().map(|e| e.id).collect();
        let mut view = StagedTruth::new(&self.truth, &mut self.turn);
        for event in &events {
            view.append_event(event)?;
        }
        Ok(ids)
    }
}

fn summarize(entity: &Entity) -> EntitySummary {
    let stats = entity.character_stats();
    EntitySummary {
        id: entity.id,
        name: entity.name.clone(),
        kind: entity.kind().to_string(),
        hp_current: stats.map(|s| s.hp_current),
        hp_max: stats.map(|s| s.hp_max),
        ac: stats.map(|s| s.ac),
    }
}

fn casting_ability(source: AbilitySource) -> Ability {
    match source {
        AbilitySource::Magic => Ability::Intelligence,
        AbilitySource::Tech => Ability::Intelligence,
        AbilitySource::Martial => Ability::Strength,
    }
}

fn pbta_name(outcome: PbtaOutcome) -> &'static str {
    match outcome {
        PbtaOutcome::StrongHit => "strong_hit",
        PbtaOutcome::WeakHit => "weak_hit",
        PbtaOutcome::Miss => "miss",
    }
}

fn pbta_event_outcome(outcome: PbtaOutcome) -> EventOutcome {
    match outcome {
        PbtaOutcome::StrongHit => EventOutcome::StrongHit,
        PbtaOutcome::WeakHit => EventOutcome::WeakHit,
        PbtaOutcome::Miss => EventOutcome::Miss,
    }
}
