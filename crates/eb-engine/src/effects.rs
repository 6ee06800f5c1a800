//! The effect pipeline: applying ability effects, ticking durations, and
//! policing concentration.
//!
//! The pipeline owns per-entity combat state for the running encounter.
//! Durable consequences (HP changes, deaths, condition applications) are
//! recorded as events by the router, so encounter state can always be
//! rebuilt from the log.

use std::collections::HashMap;

use tracing::debug;

use eb_core::condition::{ActiveEffect, CombatState, ConditionInstance, ConditionType, DurationType};
use eb_core::entity::Ability;
use eb_core::ids::{AbilityId, EntityId, UniverseId};
use eb_mechanics::ability::{AbilityDef, ConditionEffect};
use eb_mechanics::checks::{attack_advantage, Advantage};
use eb_mechanics::dice::{DiceExpr, DiceRoller};
use eb_mechanics::overlay::PhysicsOverlay;

use crate::error::{EngineError, EngineResult};

/// One target of an ability, with the save modifier it would use against
/// this ability's save DC.
#[derive(Debug, Clone, Copy)]
pub struct TargetRef {
    pub id: EntityId,
    pub save_modifier: i32,
}

/// A saving throw rolled inside the pipeline.
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub entity_id: EntityId,
    pub ability: Ability,
    pub roll: i32,
    pub total: i32,
    pub dc: i32,
    pub success: bool,
}

/// What applying an ability did.
#[derive(Debug, Clone, Default)]
pub struct EffectReport {
    pub ability_name: String,
    pub targets_affected: Vec<EntityId>,
    pub damage_dealt: Vec<(EntityId, i32)>,
    pub healing_done: Vec<(EntityId, i32)>,
    pub conditions_applied: Vec<(EntityId, ConditionType)>,
    pub conditions_resisted: Vec<(EntityId, ConditionType)>,
    pub stat_effects_applied: u32,
    pub saves: Vec<SaveReport>,
    pub concentration_started: bool,
}

/// What a round tick did for one entity.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub round: u32,
    /// True when this round was already processed; nothing changed.
    pub skipped: bool,
    pub conditions_expired: Vec<ConditionType>,
    pub effects_expired: Vec<String>,
    pub saves: Vec<SaveReport>,
    pub dot_damage: i32,
}

/// Result of a concentration check after taking damage.
#[derive(Debug, Clone)]
pub struct ConcentrationReport {
    pub maintained: bool,
    pub roll: i32,
    pub total: i32,
    pub dc: i32,
    pub ability_lost: Option<AbilityId>,
    /// Entities that lost effects when concentration broke.
    pub entities_stripped: Vec<EntityId>,
}

/// Service owning encounter state and resolving ability effects.
#[derive(Debug, Default)]
pub struct EffectPipeline {
    states: HashMap<(EntityId, UniverseId), CombatState>,
}

impl EffectPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create combat state for an entity.
    pub fn state(&mut self, entity: EntityId, universe: UniverseId) -> &mut CombatState {
        self.states
            .entry((entity, universe))
            .or_insert_with(|| CombatState::new(entity, universe))
    }

    pub fn state_ref(&self, entity: EntityId, universe: UniverseId) -> Option<&CombatState> {
        self.states.get(&(entity, universe))
    }

    pub fn has_condition(
        &self,
        entity: EntityId,
        universe: UniverseId,
        condition: ConditionType,
    ) -> bool {
        self.state_ref(entity, universe)
            .is_some_and(|s| s.has_condition(condition))
    }

    fn conditions_of(&self, entity: EntityId, universe: UniverseId) -> Vec<ConditionType> {
        self.state_ref(entity, universe)
            .map(|s| s.conditions.iter().map(|c| c.condition).collect())
            .unwrap_or_default()
    }

    /// Net advantage and auto-crit for an attack, from both sides'
    /// conditions.
    pub fn attack_advantage_modifier(
        &self,
        attacker: EntityId,
        target: EntityId,
        universe: UniverseId,
        melee: bool,
    ) -> (Advantage, bool) {
        attack_advantage(
            &self.conditions_of(attacker, universe),
            &self.conditions_of(target, universe),
            melee,
        )
    }

    /// Apply an ability's effect blocks to a set of targets.
    ///
    /// Damage rolls save-for-half, conditions save-to-negate, stat modifiers
    /// attach with their durations, and a concentration ability displaces
    /// any prior concentration by the same caster. HP changes are returned
    /// in the report for the router to apply; they are not written here.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ability_effects(
        &mut self,
        ability: &AbilityDef,
        caster: EntityId,
        save_dc: i32,
        targets: &[TargetRef],
        universe: UniverseId,
        overlay: Option<&PhysicsOverlay>,
        roller: &mut dyn DiceRoller,
    ) -> EngineResult<EffectReport> {
        if let Some(overlay) = overlay {
            overlay.check_source(ability.source)?;
        }
        let save_dc = save_dc + overlay.map_or(0, |o| o.save_dc_delta(ability.source));

        let mut report = EffectReport {
            ability_name: ability.name.clone(),
            ..EffectReport::default()
        };

        for target in targets {
            let mut affected = false;

            if let Some(damage) = &ability.damage {
                let mut expr = DiceExpr::parse(&damage.dice)?;
                if let Some(overlay) = overlay {
                    for _ in 0..overlay.bonus_damage_dice(ability.source) {
                        expr = bonus_die(&expr, &damage.dice)?;
                    }
                }
                let mut amount = expr.roll(roller).total;

                if let Some(save_ability) = damage.save_ability {
                    let save = roll_save(target, save_ability, save_dc, roller);
                    if save.success {
                        amount = if damage.save_for_half { amount / 2 } else { 0 };
                    }
                    report.saves.push(save);
                }

                if amount > 0 {
                    report.damage_dealt.push((target.id, amount));
                    affected = true;
                }
            }

            if let Some(healing) = &ability.healing {
                let mut amount = healing.flat;
                if let Some(dice) = &healing.dice {
                    amount += DiceExpr::parse(dice)?.roll(roller).total;
                }
                if let Some(overlay) = overlay {
                    amount = overlay.adjust_healing(amount);
                }
                if amount > 0 {
                    report.healing_done.push((target.id, amount));
                    affected = true;
                }
            }

            for condition_effect in &ability.conditions {
                match self.apply_condition(
                    ability,
                    condition_effect,
                    caster,
                    target,
                    save_dc,
                    universe,
                    overlay,
                    roller,
                ) {
                    AppliedCondition::Applied(save) => {
                        report.conditions_applied.push((target.id, condition_effect.condition));
                        report.saves.extend(save);
                        affected = true;
                    }
                    AppliedCondition::Resisted(save) => {
                        report.conditions_resisted.push((target.id, condition_effect.condition));
                        report.saves.push(save);
                    }
                }
            }

            for stat_mod in &ability.stat_modifiers {
                let mut effect = ActiveEffect::new(target.id, universe, stat_mod.stat.clone(), stat_mod.modifier);
                if let Some(rounds) = stat_mod.duration_rounds {
                    effect = effect.lasting_rounds(rounds);
                }
                effect.requires_concentration = ability.requires_concentration;
                effect.source_ability = Some(ability.id);
                effect.source_entity = Some(caster);
                self.state(target.id, universe).add_effect(effect);
                report.stat_effects_applied += 1;
                affected = true;
            }

            if affected {
                report.targets_affected.push(target.id);
            }
        }

        if ability.requires_concentration && !report.targets_affected.is_empty() {
            let already = self.state(caster, universe).is_concentrating();
            if already {
                debug!(caster = %caster, ability = %ability.name, "displacing prior concentration");
                self.drop_concentration(caster, universe);
            }
            self.state(caster, universe).solo.concentrating_on = Some(ability.id);
            report.concentration_started = true;
        }

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_condition(
        &mut self,
        ability: &AbilityDef,
        effect: &ConditionEffect,
        caster: EntityId,
        target: &TargetRef,
        save_dc: i32,
        universe: UniverseId,
        overlay: Option<&PhysicsOverlay>,
        roller: &mut dyn DiceRoller,
    ) -> AppliedCondition {
        let mut save_report = None;
        if let Some(save_ability) = effect.save_ability {
            let save = roll_save(target, save_ability, save_dc, roller);
            if save.success {
                return AppliedCondition::Resisted(save);
            }
            save_report = Some(save);
        }

        let mut instance = ConditionInstance::new(target.id, universe, effect.condition);
        instance.source_ability = Some(ability.id);
        instance.source_entity = Some(caster);
        if effect.until_save {
            instance = instance.until_save(
                effect.save_ability.unwrap_or(Ability::Constitution),
                save_dc,
            );
        } else if let Some(rounds) = effect.duration_rounds {
            let rounds = overlay.map_or(rounds, |o| o.adjust_duration(rounds));
            instance = instance.lasting_rounds(rounds);
        }
        self.state(target.id, universe).add_condition(instance);
        AppliedCondition::Applied(save_report)
    }

    /// Process the start of an entity's turn for the given round.
    ///
    /// Damage-over-time fires, `until_save` conditions get their end-of-turn
    /// save, and remaining durations count down. Calling twice for the same
    /// round is a no-op.
    pub fn tick_round(
        &mut self,
        entity: EntityId,
        universe: UniverseId,
        round: u32,
        save_modifier: impl Fn(Ability) -> i32,
        roller: &mut dyn DiceRoller,
    ) -> TickReport {
        let state = self.state(entity, universe);
        if state.last_ticked_round == Some(round) {
            return TickReport {
                round,
                skipped: true,
                ..TickReport::default()
            };
        }

        let mut report = TickReport {
            round,
            ..TickReport::default()
        };

        // Damage over time fires before anything expires.
        for condition in &state.conditions {
            if let Some(dice) = &condition.dot_dice {
                if let Ok(expr) = DiceExpr::parse(dice) {
                    report.dot_damage += expr.roll(roller).total;
                }
            }
        }

        // End-of-turn saves against until_save conditions.
        let mut ended = Vec::new();
        for condition in &state.conditions {
            if condition.duration_type == DurationType::UntilSave {
                if let (Some(ability), Some(dc)) = (condition.save_ability, condition.save_dc) {
                    let roll = roller.roll_die(20) as i32;
                    let total = roll + save_modifier(ability);
                    let success = total >= dc;
                    report.saves.push(SaveReport {
                        entity_id: entity,
                        ability,
                        roll,
                        total,
                        dc,
                        success,
                    });
                    if success {
                        ended.push(condition.condition);
                    }
                }
            }
        }
        for condition in &ended {
            state.remove_condition(*condition);
            report.conditions_expired.push(*condition);
        }

        // Duration countdown.
        let mut expired = Vec::new();
        state.conditions.retain_mut(|condition| {
            if condition.tick() {
                expired.push(condition.condition);
                false
            } else {
                true
            }
        });
        report.conditions_expired.extend(expired);

        state.effects.retain_mut(|effect| {
            if effect.tick() {
                report.effects_expired.push(effect.stat.clone());
                false
            } else {
                true
            }
        });

        state.last_ticked_round = Some(round);
        state.solo.current_round = round;
        state.damage_this_round = 0;
        report
    }

    /// Roll a concentration check after taking damage.
    ///
    /// DC is `max(10, damage / 2)`. On failure the caster's concentration
    /// ability drops and every effect it sustained is stripped, on the
    /// caster and everyone else.
    pub fn check_concentration(
        &mut self,
        caster: EntityId,
        universe: UniverseId,
        damage: i32,
        con_save_modifier: i32,
        roller: &mut dyn DiceRoller,
    ) -> Option<ConcentrationReport> {
        if !self.state(caster, universe).is_concentrating() {
            return None;
        }

        let dc = (damage / 2).max(10);
        let roll = roller.roll_die(20) as i32;
        let total = roll + con_save_modifier;
        let maintained = total >= dc;

        let (ability_lost, entities_stripped) = if maintained {
            (None, Vec::new())
        } else {
            (self.state(caster, universe).solo.concentrating_on, self.drop_concentration(caster, universe))
        };

        Some(ConcentrationReport {
            maintained,
            roll,
            total,
            dc,
            ability_lost,
            entities_stripped,
        })
    }

    /// Drop a caster's concentration and strip the effects it sustained
    /// everywhere in the universe. Returns the entities that lost effects.
    pub fn drop_concentration(&mut self, caster: EntityId, universe: UniverseId) -> Vec<EntityId> {
        let mut stripped = Vec::new();
        for ((entity, state_universe), state) in &mut self.states {
            if *state_universe != universe {
                continue;
            }
            let before = state.effects.len();
            state
                .effects
                .retain(|e| !(e.requires_concentration && e.source_entity == Some(caster)));
            if state.effects.len() < before {
                stripped.push(*entity);
            }
        }
        self.state(caster, universe).solo.concentrating_on = None;
        stripped
    }

    /// Note incoming damage for this round's defy-death DC.
    pub fn record_damage(&mut self, entity: EntityId, universe: UniverseId, amount: i32) {
        self.state(entity, universe).damage_this_round += amount.max(0);
    }

    /// Clear all encounter state for a universe (combat over).
    pub fn clear_universe(&mut self, universe: UniverseId) {
        self.states.retain(|(_, u), _| *u != universe);
    }
}

enum AppliedCondition {
    Applied(Option<SaveReport>),
    Resisted(SaveReport),
}

fn roll_save(
    target: &TargetRef,
    ability: Ability,
    dc: i32,
    roller: &mut dyn DiceRoller,
) -> SaveReport {
    let roll = roller.roll_die(20) as i32;
    let total = roll + target.save_modifier;
    SaveReport {
        entity_id: target.id,
        ability,
        roll,
        total,
        dc,
        success: total >= dc,
    }
}

/// Append one extra copy of the first die group (enhanced-source bonus).
fn bonus_die(expr: &DiceExpr, original: &str) -> EngineResult<DiceExpr> {
    // "3d6" + bonus die -> "3d6+1d6": reuse the sides of the leading term.
    let sides = original
        .split(['+', '-'])
        .next()
        .and_then(|chunk| chunk.split('d').nth(1))
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| EngineError::BadInput(format!("cannot extend damage dice '{original}'")))?;
    Ok(DiceExpr::parse(&format!("{expr}+1d{sides}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_mechanics::ability::{AbilityDef, ConditionEffect};
    use eb_mechanics::dice::ScriptedRoller;
    use eb_mechanics::overlay::named_overlay;

    fn target(id: EntityId, save_modifier: i32) -> TargetRef {
        TargetRef { id, save_modifier }
    }

    fn fire_spell() -> AbilityDef {
        let mut spell = AbilityDef::spell("Scorch", 1).with_damage("2d6", "fire");
        if let Some(damage) = &mut spell.damage {
            damage.save_ability = Some(Ability::Dexterity);
            damage.save_for_half = true;
        }
        spell
    }

    #[test]
    fn damage_save_for_half() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let caster = EntityId::new();
        let victim = EntityId::new();

        // Damage 4+4=8; save roll 18 vs DC 13 succeeds -> half damage.
        let report = pipeline
            .apply_ability_effects(
                &fire_spell(),
                caster,
                13,
                &[target(victim, 2)],
                universe,
                None,
                &mut ScriptedRoller::new(vec![4, 4, 16]),
            )
            .unwrap();
        assert_eq!(report.damage_dealt, vec![(victim, 4)]);
        assert!(report.saves[0].success);
    }

    #[test]
    fn damage_full_on_failed_save() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let report = pipeline
            .apply_ability_effects(
                &fire_spell(),
                EntityId::new(),
                13,
                &[target(EntityId::new(), 0)],
                universe,
                None,
                &mut ScriptedRoller::new(vec![4, 4, 5]),
            )
            .unwrap();
        assert_eq!(report.damage_dealt[0].1, 8);
    }

    #[test]
    fn condition_negated_by_save() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let victim = EntityId::new();
        let spell = AbilityDef::spell("Trip Wire", 1).with_condition(ConditionEffect {
            condition: ConditionType::Prone,
            duration_rounds: Some(2),
            until_save: false,
            save_ability: Some(Ability::Dexterity),
        });

        // Save 17 vs DC 12: resisted.
        let report = pipeline
            .apply_ability_effects(
                &spell,
                EntityId::new(),
                12,
                &[target(victim, 1)],
                universe,
                None,
                &mut ScriptedRoller::new(vec![16]),
            )
            .unwrap();
        assert!(report.conditions_applied.is_empty());
        assert_eq!(report.conditions_resisted, vec![(victim, ConditionType::Prone)]);
        assert!(!pipeline.has_condition(victim, universe, ConditionType::Prone));

        // Save 5 vs DC 12: applied.
        let report = pipeline
            .apply_ability_effects(
                &spell,
                EntityId::new(),
                12,
                &[target(victim, 1)],
                universe,
                None,
                &mut ScriptedRoller::new(vec![4]),
            )
            .unwrap();
        assert_eq!(report.conditions_applied, vec![(victim, ConditionType::Prone)]);
        assert!(pipeline.has_condition(victim, universe, ConditionType::Prone));
    }

    #[test]
    fn concentration_displaces_prior() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let caster = EntityId::new();
        let ally = EntityId::new();

        let bless = AbilityDef::spell("Bless", 1)
            .with_stat_modifier("attack_rolls", 1, 10)
            .concentration();
        let shield = AbilityDef::spell("Warding Bond", 2)
            .with_stat_modifier("ac", 1, 10)
            .concentration();

        pipeline
            .apply_ability_effects(&bless, caster, 13, &[target(ally, 0)], universe, None, &mut ScriptedRoller::new(vec![]))
            .unwrap();
        assert!(pipeline.state(caster, universe).is_concentrating());
        assert_eq!(pipeline.state(ally, universe).stat_modifier("attack_rolls"), 1);

        pipeline
            .apply_ability_effects(&shield, caster, 13, &[target(ally, 0)], universe, None, &mut ScriptedRoller::new(vec![]))
            .unwrap();
        // Bless's effect is gone, the ward remains.
        assert_eq!(pipeline.state(ally, universe).stat_modifier("attack_rolls"), 0);
        assert_eq!(pipeline.state(ally, universe).stat_modifier("ac"), 1);
        assert_eq!(
            pipeline.state(caster, universe).solo.concentrating_on,
            Some(shield.id)
        );
    }

    #[test]
    fn tick_round_is_idempotent_per_round() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let entity = EntityId::new();
        let mut condition = ConditionInstance::new(entity, universe, ConditionType::Frightened)
            .lasting_rounds(3);
        condition.source_entity = None;
        pipeline.state(entity, universe).add_condition(condition);

        let report = pipeline.tick_round(entity, universe, 1, |_| 0, &mut ScriptedRoller::new(vec![]));
        assert!(!report.skipped);
        let remaining = pipeline.state(entity, universe).conditions[0].remaining;
        assert_eq!(remaining, Some(2));

        // Same round again: no change.
        let report = pipeline.tick_round(entity, universe, 1, |_| 0, &mut ScriptedRoller::new(vec![]));
        assert!(report.skipped);
        assert_eq!(pipeline.state(entity, universe).conditions[0].remaining, Some(2));

        // Next rounds expire it; duration never goes below zero.
        pipeline.tick_round(entity, universe, 2, |_| 0, &mut ScriptedRoller::new(vec![]));
        let report = pipeline.tick_round(entity, universe, 3, |_| 0, &mut ScriptedRoller::new(vec![]));
        assert_eq!(report.conditions_expired, vec![ConditionType::Frightened]);
        assert!(pipeline.state(entity, universe).conditions.is_empty());
    }

    #[test]
    fn until_save_condition_ends_on_successful_save() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let entity = EntityId::new();
        let condition = ConditionInstance::new(entity, universe, ConditionType::Poisoned)
            .until_save(Ability::Constitution, 12);
        pipeline.state(entity, universe).add_condition(condition);

        // Roll 8 + 2 = 10 vs 12: still poisoned.
        let report = pipeline.tick_round(entity, universe, 1, |_| 2, &mut ScriptedRoller::new(vec![8]));
        assert!(report.saves[0].dc == 12 && !report.saves[0].success);
        assert!(pipeline.has_condition(entity, universe, ConditionType::Poisoned));

        // Roll 12 + 2 = 14 vs 12: shrugged off.
        let report = pipeline.tick_round(entity, universe, 2, |_| 2, &mut ScriptedRoller::new(vec![12]));
        assert!(report.saves[0].success);
        assert!(!pipeline.has_condition(entity, universe, ConditionType::Poisoned));
    }

    #[test]
    fn dot_damage_fires_each_round() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let entity = EntityId::new();
        let mut burning = ConditionInstance::new(entity, universe, ConditionType::Burning)
            .lasting_rounds(3);
        burning.dot_dice = Some("1d6".to_string());
        burning.dot_damage_type = Some("fire".to_string());
        pipeline.state(entity, universe).add_condition(burning);

        let report = pipeline.tick_round(entity, universe, 1, |_| 0, &mut ScriptedRoller::new(vec![4]));
        assert_eq!(report.dot_damage, 4);
    }

    #[test]
    fn concentration_check_breaks_on_failure() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let caster = EntityId::new();
        let ally_a = EntityId::new();
        let ally_b = EntityId::new();

        let bless = AbilityDef::spell("Bless", 1)
            .with_stat_modifier("attack_rolls", 1, 10)
            .concentration();
        pipeline
            .apply_ability_effects(
                &bless,
                caster,
                13,
                &[target(ally_a, 0), target(ally_b, 0)],
                universe,
                None,
                &mut ScriptedRoller::new(vec![]),
            )
            .unwrap();

        // 18 damage -> DC max(10, 9) = 10; roll 4 + 1 = 5 fails.
        let report = pipeline
            .check_concentration(caster, universe, 18, 1, &mut ScriptedRoller::new(vec![4]))
            .unwrap();
        assert!(!report.maintained);
        assert_eq!(report.dc, 10);
        assert_eq!(report.total, 5);
        assert_eq!(report.ability_lost, Some(bless.id));
        assert_eq!(report.entities_stripped.len(), 2);
        assert_eq!(pipeline.state(ally_a, universe).stat_modifier("attack_rolls"), 0);
        assert_eq!(pipeline.state(ally_b, universe).stat_modifier("attack_rolls"), 0);
    }

    #[test]
    fn concentration_check_dc_scales_with_damage() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let caster = EntityId::new();
        let bless = AbilityDef::spell("Bless", 1)
            .with_stat_modifier("attack_rolls", 1, 10)
            .concentration();
        pipeline
            .apply_ability_effects(&bless, caster, 13, &[target(caster, 0)], universe, None, &mut ScriptedRoller::new(vec![]))
            .unwrap();

        let report = pipeline
            .check_concentration(caster, universe, 44, 3, &mut ScriptedRoller::new(vec![19]))
            .unwrap();
        assert_eq!(report.dc, 22);
        assert!(report.maintained);
        assert!(pipeline.state(caster, universe).is_concentrating());
    }

    #[test]
    fn no_concentration_check_when_not_concentrating() {
        let mut pipeline = EffectPipeline::new();
        assert!(pipeline
            .check_concentration(EntityId::new(), UniverseId::new(), 10, 0, &mut ScriptedRoller::new(vec![]))
            .is_none());
    }

    #[test]
    fn forbidden_source_fails() {
        let mut pipeline = EffectPipeline::new();
        let overlay = named_overlay("dead_magic_zone").unwrap();
        let result = pipeline.apply_ability_effects(
            &fire_spell(),
            EntityId::new(),
            13,
            &[target(EntityId::new(), 0)],
            UniverseId::new(),
            Some(&overlay),
            &mut ScriptedRoller::new(vec![]),
        );
        assert!(matches!(result, Err(EngineError::RuleViolation(_))));
    }

    #[test]
    fn enhanced_source_rolls_extra_die() {
        let mut pipeline = EffectPipeline::new();
        let overlay = named_overlay("wild_magic_storm").unwrap();
        let mut spell = AbilityDef::spell("Scorch", 1).with_damage("2d6", "fire");
        spell.damage.as_mut().unwrap().save_ability = None;

        // 2d6 + bonus 1d6 = 4 + 4 + 6.
        let report = pipeline
            .apply_ability_effects(
                &spell,
                EntityId::new(),
                13,
                &[target(EntityId::new(), 0)],
                UniverseId::new(),
                Some(&overlay),
                &mut ScriptedRoller::new(vec![4, 4, 6]),
            )
            .unwrap();
        assert_eq!(report.damage_dealt[0].1, 14);
    }

    #[test]
    fn advantage_from_conditions() {
        let mut pipeline = EffectPipeline::new();
        let universe = UniverseId::new();
        let attacker = EntityId::new();
        let victim = EntityId::new();
        pipeline
            .state(victim, universe)
            .add_condition(ConditionInstance::new(victim, universe, ConditionType::Prone));

        let (advantage, auto_crit) = pipeline.attack_advantage_modifier(attacker, victim, universe, true);
        assert_eq!(advantage, Advantage::Advantage);
        assert!(!auto_crit);

        pipeline
            .state(victim, universe)
            .add_condition(ConditionInstance::new(victim, universe, ConditionType::Paralyzed));
        let (_, auto_crit) = pipeline.attack_advantage_modifier(attacker, victim, universe, true);
        assert!(auto_crit);
    }
}
