//! Conditions, active effects, and per-entity combat state.
//!
//! A `ConditionInstance` is a status applied to an entity (blinded, prone,
//! burning, ...). An `ActiveEffect` is a temporary stat modifier (+2 AC from
//! a ward, -10 speed from webbing). Both carry durations that the effect
//! pipeline ticks down each combat round.

use serde::{Deserialize, Serialize};

use crate::entity::Ability;
use crate::ids::{AbilityId, EntityId, UniverseId};
use crate::resources::SoloState;
use uuid::Uuid;

/// The SRD condition set plus engine extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Blinded,
    Charmed,
    Deafened,
    Exhaustion,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,

    // Extensions
    Burning,
    Bleeding,
    Slowed,
    Hasted,
}

impl ConditionType {
    /// Conditions that prevent taking actions.
    pub fn is_incapacitating(self) -> bool {
        matches!(
            self,
            Self::Incapacitated | Self::Paralyzed | Self::Petrified | Self::Stunned | Self::Unconscious
        )
    }

    /// Parse from snake_case.
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Blinded => "blinded",
            Self::Charmed => "charmed",
            Self::Deafened => "deafened",
            Self::Exhaustion => "exhaustion",
            Self::Frightened => "frightened",
            Self::Grappled => "grappled",
            Self::Incapacitated => "incapacitated",
            Self::Invisible => "invisible",
            Self::Paralyzed => "paralyzed",
            Self::Petrified => "petrified",
            Self::Poisoned => "poisoned",
            Self::Prone => "prone",
            Self::Restrained => "restrained",
            Self::Stunned => "stunned",
            Self::Unconscious => "unconscious",
            Self::Burning => "burning",
            Self::Bleeding => "bleeding",
            Self::Slowed => "slowed",
            Self::Hasted => "hasted",
        }
    }
}

/// How a condition or effect duration is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationType {
    /// Expires after N combat rounds.
    Rounds,
    /// Expires after N minutes (10 rounds per minute).
    Minutes,
    /// Save at end of each turn to end.
    UntilSave,
    /// Removed by a rest.
    UntilRest,
    /// Requires explicit removal.
    Permanent,
}

/// An active condition on an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionInstance {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub universe_id: UniverseId,
    pub condition: ConditionType,
    pub duration_type: DurationType,
    /// Rounds/minutes remaining. Always >= 0; at 0 the next tick removes it.
    pub remaining: Option<u32>,
    /// Combat round when the condition was applied.
    pub applied_at_round: u32,
    /// Save to shrug off an `UntilSave` condition.
    pub save_ability: Option<Ability>,
    pub save_dc: Option<i32>,
    /// Stacking level, only meaningful for exhaustion (1-6).
    pub level: u8,
    /// Damage dice applied at the start of the bearer's turn (burning,
    /// bleeding).
    pub dot_dice: Option<String>,
    pub dot_damage_type: Option<String>,
    pub source_ability: Option<AbilityId>,
    pub source_entity: Option<EntityId>,
}

impl ConditionInstance {
    pub fn new(entity_id: EntityId, universe_id: UniverseId, condition: ConditionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            universe_id,
            condition,
            duration_type: DurationType::Permanent,
            remaining: None,
            applied_at_round: 0,
            save_ability: None,
            save_dc: None,
            level: 1,
            dot_dice: None,
            dot_damage_type: None,
            source_ability: None,
            source_entity: None,
        }
    }

    pub fn lasting_rounds(mut self, rounds: u32) -> Self {
        self.duration_type = DurationType::Rounds;
        self.remaining = Some(rounds);
        self
    }

    pub fn until_save(mut self, ability: Ability, dc: i32) -> Self {
        self.duration_type = DurationType::UntilSave;
        self.save_ability = Some(ability);
        self.save_dc = Some(dc);
        self
    }

    /// Advance the condition one round. Returns true when it has expired.
    pub fn tick(&mut self) -> bool {
        match self.duration_type {
            DurationType::Permanent | DurationType::UntilSave | DurationType::UntilRest => false,
            DurationType::Rounds | DurationType::Minutes => match &mut self.remaining {
                Some(0) => true,
                Some(remaining) => {
                    *remaining -= 1;
                    *remaining == 0
                }
                None => false,
            },
        }
    }
}

/// How an active effect's modifier combines with the base stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Bonus,
    Penalty,
    Set,
}

/// A temporary stat modification on an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub universe_id: UniverseId,
    /// Stat being modified: "ac", "speed", "attack_rolls", "str", ...
    pub stat: String,
    pub modifier: i32,
    pub kind: ModifierKind,
    pub duration_type: DurationType,
    pub remaining: Option<u32>,
    /// Held up by its caster's concentration; dropped when that breaks.
    pub requires_concentration: bool,
    pub source_ability: Option<AbilityId>,
    pub source_entity: Option<EntityId>,
}

impl ActiveEffect {
    pub fn new(
        entity_id: EntityId,
        universe_id: UniverseId,
        stat: impl Into<String>,
        modifier: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            universe_id,
            stat: stat.into(),
            modifier,
            kind: if modifier >= 0 {
                ModifierKind::Bonus
            } else {
                ModifierKind::Penalty
            },
            duration_type: DurationType::Permanent,
            remaining: None,
            requires_concentration: false,
            source_ability: None,
            source_entity: None,
        }
    }

    pub fn lasting_rounds(mut self, rounds: u32) -> Self {
        self.duration_type = DurationType::Rounds;
        self.remaining = Some(rounds);
        self
    }

    /// Apply this modifier to a base value.
    pub fn apply(&self, base: i32) -> i32 {
        match self.kind {
            ModifierKind::Bonus => base + self.modifier.abs(),
            ModifierKind::Penalty => base - self.modifier.abs(),
            ModifierKind::Set => self.modifier,
        }
    }

    /// Advance the effect one round. Returns true when it has expired.
    /// Concentration-held effects never expire on their own.
    pub fn tick(&mut self) -> bool {
        if self.requires_concentration {
            return false;
        }
        match self.duration_type {
            DurationType::Permanent | DurationType::UntilSave | DurationType::UntilRest => false,
            DurationType::Rounds | DurationType::Minutes => match &mut self.remaining {
                Some(0) => true,
                Some(remaining) => {
                    *remaining -= 1;
                    *remaining == 0
                }
                None => false,
            },
        }
    }
}

/// Per-entity combat state: conditions, effects, concentration, action
/// economy, and tick bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub entity_id: EntityId,
    pub universe_id: UniverseId,
    pub conditions: Vec<ConditionInstance>,
    pub effects: Vec<ActiveEffect>,
    pub solo: SoloState,
    /// Round number of the last processed tick; repeated ticks in the same
    /// round are no-ops.
    pub last_ticked_round: Option<u32>,
    /// Damage accumulated this round (drives defy-death DCs).
    pub damage_this_round: i32,
}

impl CombatState {
    pub fn new(entity_id: EntityId, universe_id: UniverseId) -> Self {
        Self {
            entity_id,
            universe_id,
            conditions: Vec::new(),
            effects: Vec::new(),
            solo: SoloState::default(),
            last_ticked_round: None,
            damage_this_round: 0,
        }
    }

    pub fn has_condition(&self, condition: ConditionType) -> bool {
        self.conditions.iter().any(|c| c.condition == condition)
    }

    pub fn condition(&self, condition: ConditionType) -> Option<&ConditionInstance> {
        self.conditions.iter().find(|c| c.condition == condition)
    }

    /// Add a condition. Exhaustion stacks its level (capped at 6); other
    /// duplicates refresh to the longer remaining duration.
    pub fn add_condition(&mut self, instance: ConditionInstance) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition == instance.condition)
        {
            if instance.condition == ConditionType::Exhaustion {
                existing.level = (existing.level + instance.level).min(6);
            } else if let (Some(new), Some(old)) = (instance.remaining, existing.remaining) {
                if new > old {
                    existing.remaining = Some(new);
                }
            }
            return;
        }
        self.conditions.push(instance);
    }

    /// Remove all conditions of a type. Returns true if any were removed.
    pub fn remove_condition(&mut self, condition: ConditionType) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.condition != condition);
        self.conditions.len() < before
    }

    pub fn add_effect(&mut self, effect: ActiveEffect) {
        self.effects.push(effect);
    }

    /// Net modifier for a stat across all bonus/penalty effects.
    pub fn stat_modifier(&self, stat: &str) -> i32 {
        self.effects
            .iter()
            .filter(|e| e.stat == stat)
            .map(|e| match e.kind {
                ModifierKind::Bonus => e.modifier.abs(),
                ModifierKind::Penalty => -e.modifier.abs(),
                ModifierKind::Set => 0,
            })
            .sum()
    }

    pub fn is_incapacitated(&self) -> bool {
        self.conditions.iter().any(|c| c.condition.is_incapacitating())
    }

    pub fn is_concentrating(&self) -> bool {
        self.solo.concentrating_on.is_some()
    }

    /// Drop concentration and strip the effects it was holding up.
    /// Returns the ability that was being concentrated on.
    pub fn break_concentration(&mut self) -> Option<AbilityId> {
        let lost = self.solo.concentrating_on.take();
        self.effects.retain(|e| !e.requires_concentration);
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CombatState {
        CombatState::new(EntityId::new(), UniverseId::new())
    }

    fn condition(kind: ConditionType) -> ConditionInstance {
        ConditionInstance::new(EntityId::new(), UniverseId::new(), kind)
    }

    #[test]
    fn incapacitating_set() {
        assert!(ConditionType::Paralyzed.is_incapacitating());
        assert!(ConditionType::Unconscious.is_incapacitating());
        assert!(!ConditionType::Prone.is_incapacitating());
        assert!(!ConditionType::Blinded.is_incapacitating());
    }

    #[test]
    fn condition_ticks_to_expiry() {
        let mut c = condition(ConditionType::Frightened).lasting_rounds(2);
        assert!(!c.tick());
        assert!(c.tick());
    }

    #[test]
    fn until_save_never_auto_expires() {
        let mut c = condition(ConditionType::Poisoned).until_save(Ability::Constitution, 13);
        for _ in 0..10 {
            assert!(!c.tick());
        }
    }

    #[test]
    fn exhaustion_stacks_capped_at_six() {
        let mut s = state();
        s.add_condition(condition(ConditionType::Exhaustion));
        let mut heavy = condition(ConditionType::Exhaustion);
        heavy.level = 4;
        s.add_condition(heavy);
        assert_eq!(s.condition(ConditionType::Exhaustion).unwrap().level, 5);

        let mut more = condition(ConditionType::Exhaustion);
        more.level = 3;
        s.add_condition(more);
        assert_eq!(s.condition(ConditionType::Exhaustion).unwrap().level, 6);
    }

    #[test]
    fn duplicate_condition_keeps_longer_duration() {
        let mut s = state();
        s.add_condition(condition(ConditionType::Prone).lasting_rounds(2));
        s.add_condition(condition(ConditionType::Prone).lasting_rounds(5));
        assert_eq!(s.conditions.len(), 1);
        assert_eq!(s.condition(ConditionType::Prone).unwrap().remaining, Some(5));

        // A shorter reapplication does not shorten it.
        s.add_condition(condition(ConditionType::Prone).lasting_rounds(1));
        assert_eq!(s.condition(ConditionType::Prone).unwrap().remaining, Some(5));
    }

    #[test]
    fn effect_apply_modes() {
        let entity = EntityId::new();
        let universe = UniverseId::new();
        let bonus = ActiveEffect::new(entity, universe, "ac", 2);
        assert_eq!(bonus.apply(10), 12);

        let penalty = ActiveEffect::new(entity, universe, "speed", -10);
        assert_eq!(penalty.kind, ModifierKind::Penalty);
        assert_eq!(penalty.apply(30), 20);

        let mut set = ActiveEffect::new(entity, universe, "ac", 17);
        set.kind = ModifierKind::Set;
        assert_eq!(set.apply(10), 17);
    }

    #[test]
    fn stat_modifier_sums_effects() {
        let mut s = state();
        let e = s.entity_id;
        let u = s.universe_id;
        s.add_effect(ActiveEffect::new(e, u, "ac", 2));
        s.add_effect(ActiveEffect::new(e, u, "ac", -1));
        s.add_effect(ActiveEffect::new(e, u, "speed", 10));
        assert_eq!(s.stat_modifier("ac"), 1);
        assert_eq!(s.stat_modifier("speed"), 10);
        assert_eq!(s.stat_modifier("str"), 0);
    }

    #[test]
    fn concentration_break_strips_held_effects() {
        let mut s = state();
        let e = s.entity_id;
        let u = s.universe_id;
        let ability = AbilityId::new();
        s.solo.concentrating_on = Some(ability);

        let mut held = ActiveEffect::new(e, u, "attack_rolls", 1);
        held.requires_concentration = true;
        s.add_effect(held);
        s.add_effect(ActiveEffect::new(e, u, "ac", 2));

        let lost = s.break_concentration();
        assert_eq!(lost, Some(ability));
        assert_eq!(s.effects.len(), 1);
        assert_eq!(s.effects[0].stat, "ac");
        assert!(!s.is_concentrating());
    }

    #[test]
    fn concentration_effect_does_not_tick_out() {
        let mut e = ActiveEffect::new(EntityId::new(), UniverseId::new(), "attack_rolls", 1)
            .lasting_rounds(1);
        e.requires_concentration = true;
        for _ in 0..5 {
            assert!(!e.tick());
        }
    }

    #[test]
    fn condition_parse_round_trip() {
        assert_eq!(ConditionType::parse("prone"), Some(ConditionType::Prone));
        assert_eq!(ConditionType::parse("burning"), Some(ConditionType::Burning));
        assert_eq!(ConditionType::parse("dizzy"), None);
        assert_eq!(ConditionType::Prone.name(), "prone");
    }
}
