//! Per-entity resource pools: spell slots, cooldowns, usage dice,
//! stress/momentum, defy-death uses, and solo-combat turn state.
//!
//! Everything here is pure bookkeeping. Rolling the dice that drive
//! degradation and recharges happens in the mechanics layer, which then
//! calls back into these records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::AbilityId;

/// Die chain for usage dice, largest first when fresh.
const USAGE_DIE_CHAIN: [u32; 5] = [4, 6, 8, 10, 12];

/// A degrading usage die: roll it when the resource is used, and on a result
/// in `degrade_on` it shrinks to the next smaller die. A d4 that degrades is
/// depleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDie {
    /// Index into the chain (0 = d4, 4 = d12).
    current_index: usize,
    /// Size the die was issued at; a long rest restores to here.
    initial_index: usize,
    /// Die results that trigger degradation.
    pub degrade_on: Vec<u32>,
    pub depleted: bool,
}

impl UsageDie {
    /// Create a usage die starting at the given size (must be one of
    /// d4/d6/d8/d10/d12).
    pub fn new(sides: u32) -> Option<Self> {
        let current_index = USAGE_DIE_CHAIN.iter().position(|&s| s == sides)?;
        Some(Self {
            current_index,
            initial_index: current_index,
            degrade_on: vec![1, 2],
            depleted: false,
        })
    }

    /// Sides of the current die, or 0 when depleted.
    pub fn sides(&self) -> u32 {
        if self.depleted {
            0
        } else {
            USAGE_DIE_CHAIN[self.current_index]
        }
    }

    /// Whether the given roll triggers degradation.
    pub fn degrades_on(&self, roll: u32) -> bool {
        self.degrade_on.contains(&roll)
    }

    /// Shrink to the next smaller die. Returns true if now depleted.
    pub fn degrade(&mut self) -> bool {
        if self.depleted {
            return true;
        }
        if self.current_index == 0 {
            self.depleted = true;
            return true;
        }
        self.current_index -= 1;
        false
    }

    /// Restore to the size the die was issued at.
    pub fn restore_full(&mut self) {
        self.depleted = false;
        self.current_index = self.initial_index;
    }
}

/// Cooldown-based ability usage with optional recharge-die and per-rest
/// recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownTracker {
    pub max_uses: u32,
    pub current_uses: u32,
    /// Die results on the recharge die that restore one use.
    pub recharge_on: Vec<u32>,
    /// Sides of the recharge die.
    pub recharge_die: u32,
    /// Rest kind that restores all uses: "short" or "long".
    pub recharge_on_rest: Option<String>,
}

impl CooldownTracker {
    pub fn new(max_uses: u32) -> Self {
        Self {
            max_uses: max_uses.max(1),
            current_uses: max_uses.max(1),
            recharge_on: Vec::new(),
            recharge_die: 6,
            recharge_on_rest: Some("short".to_string()),
        }
    }

    pub fn has_uses(&self) -> bool {
        self.current_uses > 0
    }

    /// Consume one use. Returns false when none remain.
    pub fn consume(&mut self) -> bool {
        if self.current_uses == 0 {
            return false;
        }
        self.current_uses -= 1;
        true
    }

    /// Restore up to `amount` uses. Returns how many were restored.
    pub fn restore(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.max_uses - self.current_uses);
        self.current_uses += restored;
        restored
    }

    /// Restore all uses if the given rest kind matches. A long rest always
    /// restores anything that recharges on rest at all.
    pub fn restore_on_rest(&mut self, rest: &str) -> u32 {
        match &self.recharge_on_rest {
            Some(kind) if rest == "long" || rest == kind => {
                let restored = self.max_uses - self.current_uses;
                self.current_uses = self.max_uses;
                restored
            }
            _ => 0,
        }
    }
}

/// Result of a stress gain, noting whether the pool hit its breaking point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressGain {
    pub old: u32,
    pub new: u32,
    /// The pool was pushed to (or past) max by this gain.
    pub breaking_point: bool,
}

/// Dual pool for martial characters: stress accumulates risk, momentum
/// accumulates reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressMomentumPool {
    pub stress: u32,
    pub stress_max: u32,
    pub momentum: u32,
    pub momentum_max: u32,
    /// Set when a breaking point has already been announced, so the event
    /// fires exactly once per excursion to max.
    pub broke: bool,
}

impl Default for StressMomentumPool {
    fn default() -> Self {
        Self {
            stress: 0,
            stress_max: 10,
            momentum: 0,
            momentum_max: 5,
            broke: false,
        }
    }
}

impl StressMomentumPool {
    pub fn at_breaking_point(&self) -> bool {
        self.stress >= self.stress_max
    }

    /// Add stress, clamped at max. The `breaking_point` flag is set only the
    /// first time the pool reaches max; reducing stress below max re-arms it.
    pub fn add_stress(&mut self, amount: u32) -> StressGain {
        let old = self.stress;
        self.stress = (self.stress + amount).min(self.stress_max);
        let breaking_point = self.at_breaking_point() && !self.broke;
        if breaking_point {
            self.broke = true;
        }
        StressGain {
            old,
            new: self.stress,
            breaking_point,
        }
    }

    pub fn reduce_stress(&mut self, amount: u32) -> u32 {
        let old = self.stress;
        self.stress = self.stress.saturating_sub(amount);
        if self.stress < self.stress_max {
            self.broke = false;
        }
        old - self.stress
    }

    /// Add momentum, clamped at max. Returns the amount actually gained.
    pub fn add_momentum(&mut self, amount: u32) -> u32 {
        let old = self.momentum;
        self.momentum = (self.momentum + amount).min(self.momentum_max);
        self.momentum - old
    }

    /// Spend momentum. Returns false when insufficient.
    pub fn spend_momentum(&mut self, amount: u32) -> bool {
        if self.momentum < amount {
            return false;
        }
        self.momentum -= amount;
        true
    }

    /// Taking damage resets momentum to 0. Returns the amount lost.
    pub fn reset_momentum(&mut self) -> u32 {
        std::mem::take(&mut self.momentum)
    }

    /// Penalty applied to checks at high stress (0, -1, or -2).
    pub fn stress_penalty(&self) -> i32 {
        if self.stress >= 7 {
            -2
        } else if self.stress >= 4 {
            -1
        } else {
            0
        }
    }
}

/// Spell slots for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlots {
    pub max: u32,
    pub current: u32,
}

/// Limited-use saves against dropping to 0 HP. Off by default; the solo
/// hero opts in with [`DefyDeathState::with_uses`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefyDeathState {
    /// Uses spent since the last long rest.
    pub uses_today: u32,
    /// Hard cap per long rest.
    pub max_uses: u32,
}

impl DefyDeathState {
    /// The standard solo allotment is 3 uses per long rest.
    pub fn with_uses(max_uses: u32) -> Self {
        Self {
            uses_today: 0,
            max_uses,
        }
    }

    pub fn uses_remaining(&self) -> u32 {
        self.max_uses.saturating_sub(self.uses_today)
    }
}

/// Per-turn action economy and solo-combat round state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoloState {
    pub current_round: u32,
    pub has_action: bool,
    pub has_bonus_action: bool,
    /// Reactions remaining this round (base 1, solo balance allows 2).
    pub reactions_remaining: u32,
    pub concentrating_on: Option<AbilityId>,
}

impl Default for SoloState {
    fn default() -> Self {
        Self {
            current_round: 0,
            has_action: true,
            has_bonus_action: true,
            reactions_remaining: 1,
            concentrating_on: None,
        }
    }
}

impl SoloState {
    /// Reset per-turn flags at the start of a round.
    pub fn start_round(&mut self, extra_reactions: u32) {
        self.current_round += 1;
        self.has_action = true;
        self.has_bonus_action = true;
        self.reactions_remaining = 1 + extra_reactions;
    }
}

/// All resource pools for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// spell level -> slots
    pub spell_slots: BTreeMap<u32, SpellSlots>,
    /// ability name -> cooldown
    pub cooldowns: BTreeMap<String, CooldownTracker>,
    /// resource name -> usage die
    pub usage_dice: BTreeMap<String, UsageDie>,
    pub stress_momentum: Option<StressMomentumPool>,
    pub defy_death: DefyDeathState,
    pub solo: SoloState,
}

impl ResourcePool {
    pub fn has_spell_slot(&self, level: u32) -> bool {
        self.spell_slots.get(&level).is_some_and(|s| s.current > 0)
    }

    /// Spend one slot of the given level. Returns false when unavailable.
    pub fn use_spell_slot(&mut self, level: u32) -> bool {
        match self.spell_slots.get_mut(&level) {
            Some(slots) if slots.current > 0 => {
                slots.current -= 1;
                true
            }
            _ => false,
        }
    }

    /// Grant spell slots at a level (also raises the max).
    pub fn grant_spell_slots(&mut self, level: u32, count: u32) {
        let slots = self
            .spell_slots
            .entry(level)
            .or_insert(SpellSlots { max: 0, current: 0 });
        slots.max += count;
        slots.current += count;
    }

    /// Restore resources for a rest. Returns human-readable notes of what
    /// was restored.
    pub fn restore_on_rest(&mut self, rest: &str) -> Vec<String> {
        let mut notes = Vec::new();

        for (name, tracker) in &mut self.cooldowns {
            let restored = tracker.restore_on_rest(rest);
            if restored > 0 {
                notes.push(format!("{name}: {restored} uses restored"));
            }
        }

        if rest == "long" {
            for (level, slots) in &mut self.spell_slots {
                if slots.current < slots.max {
                    notes.push(format!(
                        "level {level} slots: {} restored",
                        slots.max - slots.current
                    ));
                    slots.current = slots.max;
                }
            }
            for (name, die) in &mut self.usage_dice {
                if die.depleted || die.current_index < die.initial_index {
                    die.restore_full();
                    notes.push(format!("{name}: usage die restored"));
                }
            }
            if let Some(pool) = &mut self.stress_momentum {
                let reduced = pool.reduce_stress(pool.stress);
                if reduced > 0 {
                    notes.push(format!("stress cleared ({reduced})"));
                }
            }
            if self.defy_death.uses_today > 0 {
                self.defy_death.uses_today = 0;
                notes.push("defy death uses restored".to_string());
            }
        }

        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_die_chain_degrades_to_depleted() {
        let mut die = UsageDie::new(8).unwrap();
        assert_eq!(die.sides(), 8);
        assert!(!die.degrade());
        assert_eq!(die.sides(), 6);
        assert!(!die.degrade());
        assert_eq!(die.sides(), 4);
        assert!(die.degrade());
        assert!(die.depleted);
        assert_eq!(die.sides(), 0);
    }

    #[test]
    fn usage_die_invalid_size() {
        assert!(UsageDie::new(7).is_none());
        assert!(UsageDie::new(20).is_none());
    }

    #[test]
    fn usage_die_restores_to_issued_size() {
        let mut die = UsageDie::new(8).unwrap();
        die.degrade();
        die.degrade();
        assert_eq!(die.sides(), 4);
        die.restore_full();
        assert_eq!(die.sides(), 8);

        let mut small = UsageDie::new(4).unwrap();
        small.degrade();
        assert!(small.depleted);
        small.restore_full();
        assert_eq!(small.sides(), 4);
    }

    #[test]
    fn usage_die_default_degrade_set() {
        let die = UsageDie::new(6).unwrap();
        assert!(die.degrades_on(1));
        assert!(die.degrades_on(2));
        assert!(!die.degrades_on(3));
    }

    #[test]
    fn cooldown_consume_and_restore() {
        let mut tracker = CooldownTracker::new(2);
        assert!(tracker.consume());
        assert!(tracker.consume());
        assert!(!tracker.consume());
        assert_eq!(tracker.restore(5), 2);
        assert_eq!(tracker.current_uses, 2);
    }

    #[test]
    fn cooldown_rest_recovery() {
        let mut tracker = CooldownTracker::new(3);
        tracker.recharge_on_rest = Some("short".to_string());
        tracker.consume();
        tracker.consume();
        assert_eq!(tracker.restore_on_rest("short"), 2);

        tracker.recharge_on_rest = Some("long".to_string());
        tracker.consume();
        // A short rest does not restore a long-rest ability.
        assert_eq!(tracker.restore_on_rest("short"), 0);
        assert_eq!(tracker.restore_on_rest("long"), 1);
    }

    #[test]
    fn stress_breaking_point_fires_once() {
        let mut pool = StressMomentumPool {
            stress_max: 3,
            ..StressMomentumPool::default()
        };
        assert!(!pool.add_stress(2).breaking_point);
        assert!(pool.add_stress(1).breaking_point);
        // Already at max and already announced: no second trigger.
        assert!(!pool.add_stress(1).breaking_point);
        // Dropping below max re-arms the trigger.
        pool.reduce_stress(1);
        assert!(pool.add_stress(1).breaking_point);
    }

    #[test]
    fn momentum_spend_and_reset() {
        let mut pool = StressMomentumPool::default();
        pool.add_momentum(3);
        assert!(pool.spend_momentum(2));
        assert!(!pool.spend_momentum(2));
        pool.add_momentum(4);
        assert_eq!(pool.momentum, 5); // clamped at momentum_max
        assert_eq!(pool.reset_momentum(), 5);
        assert_eq!(pool.momentum, 0);
    }

    #[test]
    fn stress_penalty_bands() {
        let mut pool = StressMomentumPool::default();
        assert_eq!(pool.stress_penalty(), 0);
        pool.add_stress(4);
        assert_eq!(pool.stress_penalty(), -1);
        pool.add_stress(3);
        assert_eq!(pool.stress_penalty(), -2);
    }

    #[test]
    fn spell_slots_spend_and_long_rest() {
        let mut pool = ResourcePool::default();
        pool.grant_spell_slots(1, 2);
        pool.grant_spell_slots(2, 1);
        assert!(pool.use_spell_slot(1));
        assert!(pool.use_spell_slot(2));
        assert!(!pool.use_spell_slot(2));
        assert!(!pool.use_spell_slot(3));

        let notes = pool.restore_on_rest("long");
        assert!(pool.has_spell_slot(2));
        assert!(notes.iter().any(|n| n.contains("level 1")));
    }

    #[test]
    fn short_rest_does_not_restore_usage_die() {
        let mut pool = ResourcePool::default();
        let mut torch = UsageDie::new(6).unwrap();
        torch.degrade();
        pool.usage_dice.insert("torch".to_string(), torch);

        pool.restore_on_rest("short");
        assert_eq!(pool.usage_dice["torch"].sides(), 4);

        pool.restore_on_rest("long");
        assert_eq!(pool.usage_dice["torch"].sides(), 6);
    }

    #[test]
    fn defy_death_uses() {
        assert_eq!(DefyDeathState::default().uses_remaining(), 0);
        let mut state = DefyDeathState::with_uses(3);
        assert_eq!(state.uses_remaining(), 3);
        state.uses_today = 3;
        assert_eq!(state.uses_remaining(), 0);
    }

    #[test]
    fn solo_state_round_reset() {
        let mut solo = SoloState::default();
        solo.has_action = false;
        solo.reactions_remaining = 0;
        solo.start_round(1);
        assert_eq!(solo.current_round, 1);
        assert!(solo.has_action);
        assert_eq!(solo.reactions_remaining, 2);
    }
}
