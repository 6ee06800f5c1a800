//! Faction reputation: standing deltas and tier labels.

use serde::{Deserialize, Serialize};

use eb_core::entity::CharacterStats;
use eb_core::ids::EntityId;

/// A change in standing with one faction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationChange {
    pub faction: EntityId,
    pub delta: i32,
    pub reason: String,
}

/// Human-readable standing tiers.
pub fn reputation_tier(score: i32) -> &'static str {
    match score {
        i32::MIN..=-50 => "hostile",
        -49..=-20 => "unfriendly",
        -19..=19 => "neutral",
        20..=49 => "friendly",
        50..=79 => "honored",
        _ => "revered",
    }
}

/// Apply reputation changes to a character's standing map. Returns the new
/// standing per faction touched.
pub fn apply_changes(
    stats: &mut CharacterStats,
    changes: &[ReputationChange],
) -> Vec<(EntityId, i32)> {
    let mut results = Vec::with_capacity(changes.len());
    for change in changes {
        let standing = stats.faction_reputation.entry(change.faction).or_insert(0);
        *standing = (*standing + change.delta).clamp(-100, 100);
        results.push((change.faction, *standing));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_bands() {
        assert_eq!(reputation_tier(-80), "hostile");
        assert_eq!(reputation_tier(-30), "unfriendly");
        assert_eq!(reputation_tier(0), "neutral");
        assert_eq!(reputation_tier(25), "friendly");
        assert_eq!(reputation_tier(60), "honored");
        assert_eq!(reputation_tier(95), "revered");
    }

    #[test]
    fn changes_accumulate_and_clamp() {
        let mut stats = CharacterStats::new(10, 10);
        let guild = EntityId::new();
        let changes = vec![
            ReputationChange {
                faction: guild,
                delta: 30,
                reason: "returned the ledger".to_string(),
            },
            ReputationChange {
                faction: guild,
                delta: 90,
                reason: "saved the guildmaster".to_string(),
            },
        ];
        let results = apply_changes(&mut stats, &changes);
        assert_eq!(results.last().unwrap().1, 100);
        assert_eq!(stats.faction_reputation[&guild], 100);

        apply_changes(
            &mut stats,
            &[ReputationChange {
                faction: guild,
                delta: -250,
                reason: "burned the guildhall".to_string(),
            }],
        );
        assert_eq!(stats.faction_reputation[&guild], -100);
        assert_eq!(reputation_tier(stats.faction_reputation[&guild]), "hostile");
    }
}
