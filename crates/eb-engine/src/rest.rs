//! Short and long rests.
//!
//! A short rest spends hit dice for HP; a long rest restores HP to full,
//! recovers half the total hit dice, and routes resource restoration
//! through the character's pool (slots, cooldowns, usage dice, stress,
//! defy-death uses).

use serde::{Deserialize, Serialize};

use eb_core::entity::CharacterStats;
use eb_mechanics::dice::DiceRoller;

/// What a rest restored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestOutcome {
    pub rest_kind: String,
    pub hp_healed: i32,
    pub hit_dice_spent: u32,
    pub hit_dice_recovered: u32,
    /// Human-readable notes from the resource pool.
    pub resources_restored: Vec<String>,
}

/// Take a short rest, spending up to `dice_to_spend` hit dice. Each die
/// heals its roll plus the CON modifier (minimum 1 per die, wasted dice are
/// not spent once HP is full).
pub fn short_rest(
    stats: &mut CharacterStats,
    dice_to_spend: u32,
    roller: &mut dyn DiceRoller,
) -> RestOutcome {
    let mut outcome = RestOutcome {
        rest_kind: "short".to_string(),
        ..RestOutcome::default()
    };

    let con_modifier = stats.abilities.modifier(eb_core::entity::Ability::Constitution);
    for _ in 0..dice_to_spend {
        if stats.hp_current >= stats.hp_max || stats.hit_dice.current == 0 {
            break;
        }
        stats.hit_dice.spend(1);
        outcome.hit_dice_spent += 1;
        let roll = roller.roll_die(stats.hit_dice.sides) as i32;
        outcome.hp_healed += stats.heal((roll + con_modifier).max(1));
    }

    outcome.resources_restored = stats.resources.restore_on_rest("short");
    outcome
}

/// Take a long rest: full HP, half the total hit dice recovered (minimum
/// one), death saves cleared, and every long-rest resource restored.
pub fn long_rest(stats: &mut CharacterStats) -> RestOutcome {
    let mut outcome = RestOutcome {
        rest_kind: "long".to_string(),
        ..RestOutcome::default()
    };

    outcome.hp_healed = stats.heal(stats.hp_max);
    outcome.hit_dice_recovered = stats.hit_dice.recover((stats.hit_dice.total / 2).max(1));
    stats.death_saves.reset();
    outcome.resources_restored = stats.resources.restore_on_rest("long");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use eb_core::entity::HitDice;
    use eb_core::resources::UsageDie;
    use eb_mechanics::dice::ScriptedRoller;

    fn wounded_fighter() -> CharacterStats {
        let mut stats = CharacterStats::new(30, 15);
        stats.abilities.constitution = 14; // +2
        stats.level = 4;
        stats.hit_dice = HitDice::new(10, 4);
        stats.hp_current = 10;
        stats
    }

    #[test]
    fn short_rest_spends_dice_for_hp() {
        let mut stats = wounded_fighter();
        let outcome = short_rest(&mut stats, 2, &mut ScriptedRoller::new(vec![6, 3]));
        assert_eq!(outcome.hit_dice_spent, 2);
        assert_eq!(outcome.hp_healed, 13); // (6+2) + (3+2)
        assert_eq!(stats.hp_current, 23);
        assert_eq!(stats.hit_dice.current, 2);
    }

    #[test]
    fn short_rest_stops_at_full_hp() {
        let mut stats = wounded_fighter();
        stats.hp_current = 29;
        let outcome = short_rest(&mut stats, 4, &mut ScriptedRoller::new(vec![8, 8, 8, 8]));
        assert_eq!(outcome.hit_dice_spent, 1);
        assert_eq!(stats.hp_current, 30);
        assert_eq!(stats.hit_dice.current, 3);
    }

    #[test]
    fn short_rest_without_hit_dice_heals_nothing() {
        let mut stats = wounded_fighter();
        stats.hit_dice.current = 0;
        let outcome = short_rest(&mut stats, 2, &mut ScriptedRoller::new(vec![10]));
        assert_eq!(outcome.hp_healed, 0);
        assert_eq!(outcome.hit_dice_spent, 0);
    }

    #[test]
    fn long_rest_restores_hp_and_half_hit_dice() {
        let mut stats = wounded_fighter();
        stats.hit_dice.current = 0;
        stats.death_saves.failures = 2;
        let outcome = long_rest(&mut stats);
        assert_eq!(stats.hp_current, 30);
        assert_eq!(outcome.hit_dice_recovered, 2);
        assert_eq!(stats.hit_dice.current, 2);
        assert_eq!(stats.death_saves.failures, 0);
    }

    #[test]
    fn long_rest_restores_resources() {
        let mut stats = wounded_fighter();
        stats.resources.grant_spell_slots(1, 2);
        stats.resources.use_spell_slot(1);
        let mut torch = UsageDie::new(6).unwrap();
        torch.degrade();
        stats.resources.usage_dice.insert("torch".to_string(), torch);
        stats.resources.defy_death.uses_today = 2;

        let outcome = long_rest(&mut stats);
        assert!(stats.resources.has_spell_slot(1));
        assert_eq!(stats.resources.usage_dice["torch"].sides(), 6);
        assert_eq!(stats.resources.defy_death.uses_today, 0);
        assert!(!outcome.resources_restored.is_empty());
    }

    #[test]
    fn short_rest_leaves_long_rest_resources_alone() {
        let mut stats = wounded_fighter();
        stats.resources.grant_spell_slots(2, 1);
        stats.resources.use_spell_slot(2);
        short_rest(&mut stats, 0, &mut ScriptedRoller::new(vec![]));
        assert!(!stats.resources.has_spell_slot(2));
    }
}
