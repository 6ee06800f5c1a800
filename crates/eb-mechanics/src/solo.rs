//! Solo-combat balance: the fray die, defy death, and heroic actions.
//!
//! These mechanics keep a lone character viable against groups: the fray die
//! chews through weaker enemies without attack rolls, defy death converts a
//! lethal hit into exhaustion a limited number of times per day, and heroic
//! actions buy extra actions with momentum or stress.

use serde::{Deserialize, Serialize};

use eb_core::ids::EntityId;
use eb_core::resources::StressMomentumPool;

use crate::dice::DiceRoller;

/// Configuration for the fray die.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrayConfig {
    /// Only enemies with HD <= the actor's level take fray damage.
    pub mooks_only: bool,
    /// Damage may be split across several valid targets.
    pub can_split: bool,
}

impl Default for FrayConfig {
    fn default() -> Self {
        Self {
            mooks_only: true,
            can_split: true,
        }
    }
}

/// Fray die sides by level: d6 at 1-4, d8 at 5-8, d10 at 9-12, d12 at 13+.
pub fn fray_die_for_level(level: u32) -> u32 {
    match level {
        0..=4 => 6,
        5..=8 => 8,
        9..=12 => 10,
        _ => 12,
    }
}

/// Result of rolling the fray die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrayOutcome {
    pub damage: i32,
    pub die_sides: u32,
    /// entity -> damage applied
    pub damage_per_target: Vec<(EntityId, i32)>,
    /// Damage with no valid target to absorb it.
    pub overflow: i32,
}

/// Roll the fray die and distribute damage across valid enemies.
///
/// `enemies` pairs each enemy with its hit-dice rating; the rating also
/// bounds how much fray damage one enemy can absorb when splitting.
pub fn roll_fray(
    actor_level: u32,
    enemies: &[(EntityId, u32)],
    config: &FrayConfig,
    roller: &mut dyn DiceRoller,
) -> FrayOutcome {
    let sides = fray_die_for_level(actor_level);
    let damage = roller.roll_die(sides) as i32;

    let mut valid: Vec<(EntityId, u32)> = enemies
        .iter()
        .copied()
        .filter(|(_, hd)| !config.mooks_only || *hd <= actor_level)
        .collect();

    let mut damage_per_target = Vec::new();
    let mut remaining = damage;

    if config.can_split {
        // Weakest first, each absorbing up to its HD.
        valid.sort_by_key(|&(_, hd)| hd);
        for (entity, hd) in valid {
            if remaining <= 0 {
                break;
            }
            let applied = remaining.min(hd as i32);
            damage_per_target.push((entity, applied));
            remaining -= applied;
        }
    } else if let Some(&(entity, _)) = valid.iter().min_by_key(|&&(_, hd)| hd) {
        damage_per_target.push((entity, remaining));
        remaining = 0;
    }

    FrayOutcome {
        damage,
        die_sides: sides,
        damage_per_target,
        overflow: remaining.max(0),
    }
}

/// Configuration for defy death.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefyDeathConfig {
    pub base_dc: i32,
    /// DC climbs by this much per prior use today.
    pub dc_per_use: i32,
    /// Surviving costs one exhaustion level.
    pub grants_exhaustion: bool,
}

impl Default for DefyDeathConfig {
    fn default() -> Self {
        Self {
            base_dc: 10,
            dc_per_use: 5,
            grants_exhaustion: true,
        }
    }
}

/// Result of a defy-death save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefyDeathOutcome {
    pub survived: bool,
    /// Whether a roll happened at all (no uses left skips the roll).
    pub attempted: bool,
    pub roll: i32,
    pub total: i32,
    pub dc: i32,
    pub exhaustion_gained: u8,
    pub uses_remaining: u32,
}

/// Attempt a defy-death save when an entity would drop to 0 HP.
///
/// DC = base + damage taken this round + per-use escalation. Natural 20
/// always survives, natural 1 never does. With no uses remaining the
/// attempt fails immediately without a roll.
pub fn defy_death(
    con_modifier: i32,
    damage_this_round: i32,
    uses_today: u32,
    max_uses: u32,
    config: &DefyDeathConfig,
    roller: &mut dyn DiceRoller,
) -> DefyDeathOutcome {
    let uses_remaining = max_uses.saturating_sub(uses_today);
    if uses_remaining == 0 {
        return DefyDeathOutcome {
            survived: false,
            attempted: false,
            roll: 0,
            total: 0,
            dc: 0,
            exhaustion_gained: 0,
            uses_remaining: 0,
        };
    }

    let dc = config.base_dc + damage_this_round + uses_today as i32 * config.dc_per_use;
    let roll = roller.roll_die(20) as i32;
    let total = roll + con_modifier;

    let survived = match roll {
        20 => true,
        1 => false,
        _ => total >= dc,
    };

    DefyDeathOutcome {
        survived,
        attempted: true,
        roll,
        total,
        dc,
        exhaustion_gained: u8::from(survived && config.grants_exhaustion),
        uses_remaining: if survived {
            uses_remaining - 1
        } else {
            uses_remaining
        },
    }
}

/// What a heroic action costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroicCost {
    /// Spend 1 momentum.
    Momentum,
    /// Take 1d4 stress.
    Stress,
    Free,
}

/// Result of attempting a heroic action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroicOutcome {
    pub success: bool,
    pub cost: HeroicCost,
    pub amount_paid: u32,
    pub reason: Option<String>,
}

/// Buy a second action this round. Mutates the pool on success.
pub fn heroic_action(
    pool: &mut StressMomentumPool,
    cost: HeroicCost,
    roller: &mut dyn DiceRoller,
) -> HeroicOutcome {
    match cost {
        HeroicCost::Momentum => {
            if pool.spend_momentum(1) {
                HeroicOutcome {
                    success: true,
                    cost,
                    amount_paid: 1,
                    reason: None,
                }
            } else {
                HeroicOutcome {
                    success: false,
                    cost,
                    amount_paid: 0,
                    reason: Some(format!("insufficient momentum ({}/1)", pool.momentum)),
                }
            }
        }
        HeroicCost::Stress => {
            let stress = roller.roll_die(4);
            if pool.stress + stress > pool.stress_max {
                HeroicOutcome {
                    success: false,
                    cost,
                    amount_paid: 0,
                    reason: Some(format!(
                        "would exceed stress maximum ({}/{})",
                        pool.stress + stress,
                        pool.stress_max
                    )),
                }
            } else {
                pool.add_stress(stress);
                HeroicOutcome {
                    success: true,
                    cost,
                    amount_paid: stress,
                    reason: None,
                }
            }
        }
        HeroicCost::Free => HeroicOutcome {
            success: true,
            cost,
            amount_paid: 0,
            reason: None,
        },
    }
}
