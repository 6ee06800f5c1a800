//! Per-universe physics overlays.
//!
//! An overlay is a configuration record applied as modifier functions over
//! the effect pipeline: enhanced sources roll an extra damage die,
//! restricted sources impose a save-DC penalty on the caster's effects, and
//! forbidden sources fail outright.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ability::AbilitySource;
use crate::error::{MechError, MechResult};

/// How a universe treats an ability source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceModifier {
    #[default]
    Normal,
    /// +1 damage die.
    Enhanced,
    /// -2 to the caster's save DCs.
    Restricted,
    /// Abilities from this source fail.
    Forbidden,
}

/// A universe's physics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhysicsOverlay {
    pub name: String,
    pub description: String,
    pub sources: BTreeMap<AbilitySource, SourceModifier>,
    /// Added to (or subtracted from) condition durations in rounds.
    pub condition_duration_delta: i32,
    /// Multiplier on healing amounts.
    pub healing_multiplier: f64,
    /// Multiplier on stress costs.
    pub stress_multiplier: f64,
}

impl PhysicsOverlay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sources: BTreeMap::new(),
            condition_duration_delta: 0,
            healing_multiplier: 1.0,
            stress_multiplier: 1.0,
        }
    }

    pub fn source_modifier(&self, source: AbilitySource) -> SourceModifier {
        self.sources.get(&source).copied().unwrap_or_default()
    }

    /// Fail fast when the source cannot function here.
    pub fn check_source(&self, source: AbilitySource) -> MechResult<()> {
        if self.source_modifier(source) == SourceModifier::Forbidden {
            return Err(MechError::RuleViolation(format!(
                "{:?} abilities do not function in {}",
                source, self.name
            )));
        }
        Ok(())
    }

    /// Extra damage dice granted to an enhanced source.
    pub fn bonus_damage_dice(&self, source: AbilitySource) -> u32 {
        u32::from(self.source_modifier(source) == SourceModifier::Enhanced)
    }

    /// Save-DC delta for the caster's effects.
    pub fn save_dc_delta(&self, source: AbilitySource) -> i32 {
        if self.source_modifier(source) == SourceModifier::Restricted {
            -2
        } else {
            0
        }
    }

    /// Adjust a condition duration, floored at 1 round.
    pub fn adjust_duration(&self, rounds: u32) -> u32 {
        (rounds as i64 + self.condition_duration_delta as i64).max(1) as u32
    }

    /// Scale a healing amount.
    pub fn adjust_healing(&self, amount: i32) -> i32 {
        ((amount as f64) * self.healing_multiplier).round() as i32
    }

    /// Scale a stress cost.
    pub fn adjust_stress(&self, amount: u32) -> u32 {
        ((amount as f64) * self.stress_multiplier).round() as u32
    }
}

/// Look up a built-in overlay by name.
pub fn named_overlay(name: &str) -> Option<PhysicsOverlay> {
    match name {
        "dead_magic_zone" => {
            let mut overlay = PhysicsOverlay::new("dead_magic_zone");
            overlay.description = "Magic simply does not answer here.".to_string();
            overlay.sources.insert(AbilitySource::Magic, SourceModifier::Forbidden);
            Some(overlay)
        }
        "wild_magic_storm" => {
            let mut overlay = PhysicsOverlay::new("wild_magic_storm");
            overlay.description = "Raw magic saturates the air.".to_string();
            overlay.sources.insert(AbilitySource::Magic, SourceModifier::Enhanced);
            overlay.condition_duration_delta = 1;
            Some(overlay)
        }
        "high_tech" => {
            let mut overlay = PhysicsOverlay::new("high_tech");
            overlay.description = "An engineered world hostile to the arcane.".to_string();
            overlay.sources.insert(AbilitySource::Tech, SourceModifier::Enhanced);
            overlay.sources.insert(AbilitySource::Magic, SourceModifier::Restricted);
            Some(overlay)
        }
        "grim_world" => {
            let mut overlay = PhysicsOverlay::new("grim_world");
            overlay.description = "Wounds fester and courage drains fast.".to_string();
            overlay.healing_multiplier = 0.5;
            overlay.stress_multiplier = 2.0;
            Some(overlay)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_overlay_is_inert() {
        let overlay = PhysicsOverlay::new("plain");
        assert!(overlay.check_source(AbilitySource::Magic).is_ok());
        assert_eq!(overlay.bonus_damage_dice(AbilitySource::Magic), 0);
        assert_eq!(overlay.save_dc_delta(AbilitySource::Magic), 0);
        assert_eq!(overlay.adjust_healing(7), 7);
    }

    #[test]
    fn forbidden_source_fails() {
        let overlay = named_overlay("dead_magic_zone").unwrap();
        assert!(overlay.check_source(AbilitySource::Magic).is_err());
        assert!(overlay.check_source(AbilitySource::Martial).is_ok());
    }

    #[test]
    fn enhanced_source_gets_bonus_die() {
        let overlay = named_overlay("wild_magic_storm").unwrap();
        assert_eq!(overlay.bonus_damage_dice(AbilitySource::Magic), 1);
        assert_eq!(overlay.adjust_duration(3), 4);
    }

    #[test]
    fn restricted_source_lowers_dc() {
        let overlay = named_overlay("high_tech").unwrap();
        assert_eq!(overlay.save_dc_delta(AbilitySource::Magic), -2);
        assert_eq!(overlay.save_dc_delta(AbilitySource::Tech), 0);
    }

    #[test]
    fn grim_world_scales_healing_and_stress() {
        let overlay = named_overlay("grim_world").unwrap();
        assert_eq!(overlay.adjust_healing(9), 5);
        assert_eq!(overlay.adjust_stress(2), 4);
    }

    #[test]
    fn duration_floor_is_one_round() {
        let mut overlay = PhysicsOverlay::new("dampened");
        overlay.condition_duration_delta = -5;
        assert_eq!(overlay.adjust_duration(2), 1);
    }

    #[test]
    fn unknown_overlay_name() {
        assert!(named_overlay("bouncy_castle").is_none());
    }
}
