//! The unified ability schema: one model for spells, tech abilities, and
//! martial techniques.
//!
//! An ability names its power source, how its usage is gated (the
//! mechanism), what it does (effect blocks), whom it can hit (targeting),
//! and what it costs in the action economy.

use serde::{Deserialize, Serialize};

use eb_core::condition::ConditionType;
use eb_core::entity::Ability as AbilityScore;
use eb_core::ids::AbilityId;

use crate::error::{MechError, MechResult};

/// Primary source of an ability's power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilitySource {
    Magic,
    Tech,
    Martial,
}

/// How an ability's usage is gated. The variant carries its own parameters,
/// so details can never disagree with the mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mechanism", rename_all = "snake_case")]
pub enum Mechanism {
    /// Traditional spell slots; level 0 is a cantrip and costs nothing.
    Slots { level: u32 },
    /// Per-encounter uses with an optional recharge die.
    Cooldown {
        max_uses: u32,
        recharge_on: Vec<u32>,
        recharge_die: u32,
        recharge_on_rest: Option<String>,
    },
    /// A degrading usage die shared with the named resource.
    UsageDie { die: u32 },
    /// Risk accumulation: using the ability adds stress.
    Stress { cost: u32 },
    /// Reward spending: using the ability costs momentum.
    Momentum { cost: u32 },
    /// At-will.
    Free,
}

/// How an ability selects its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingKind {
    SelfOnly,
    Single,
    Multiple,
    AreaSphere,
    AreaCone,
    AreaLine,
    AreaCube,
}

impl TargetingKind {
    pub fn is_area(self) -> bool {
        matches!(
            self,
            Self::AreaSphere | Self::AreaCone | Self::AreaLine | Self::AreaCube
        )
    }
}

/// Targeting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    pub kind: TargetingKind,
    /// Range in feet; 0 means self or touch.
    pub range_ft: u32,
    /// Radius, length, or side depending on the kind.
    pub area_size_ft: Option<u32>,
    /// Cap for `Multiple`.
    pub max_targets: Option<u32>,
}

impl Targeting {
    pub fn self_only() -> Self {
        Self {
            kind: TargetingKind::SelfOnly,
            range_ft: 0,
            area_size_ft: None,
            max_targets: None,
        }
    }

    pub fn single(range_ft: u32) -> Self {
        Self {
            kind: TargetingKind::Single,
            range_ft,
            area_size_ft: None,
            max_targets: None,
        }
    }

    pub fn sphere(range_ft: u32, radius_ft: u32) -> Self {
        Self {
            kind: TargetingKind::AreaSphere,
            range_ft,
            area_size_ft: Some(radius_ft),
            max_targets: None,
        }
    }
}

/// Action-economy cost of using an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCost {
    #[default]
    Action,
    Bonus,
    Reaction,
    Free,
}

/// Damage component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEffect {
    /// Dice notation, e.g. "3d6".
    pub dice: String,
    pub damage_type: String,
    /// Save to reduce or avoid the damage.
    pub save_ability: Option<AbilityScore>,
    /// Successful save halves instead of negating.
    pub save_for_half: bool,
}

/// Healing component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingEffect {
    pub dice: Option<String>,
    pub flat: i32,
    /// Grant temporary HP instead of restoring.
    pub temp_hp: bool,
}

/// Condition-application component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionEffect {
    pub condition: ConditionType,
    /// "rounds", "minutes", "until_save", or "permanent".
    pub duration_rounds: Option<u32>,
    pub until_save: bool,
    /// Save to resist the application entirely.
    pub save_ability: Option<AbilityScore>,
}

/// Temporary stat-modifier component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifierEffect {
    /// Stat to modify: "ac", "speed", "attack_rolls", ...
    pub stat: String,
    pub modifier: i32,
    pub duration_rounds: Option<u32>,
}

/// Universal ability object: the core model for any ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: AbilityId,
    pub name: String,
    pub description: String,
    pub source: AbilitySource,
    /// Source-specific subtype: arcane, divine, cybertech, ki, ...
    pub subtype: Option<String>,
    pub mechanism: Mechanism,
    pub damage: Option<DamageEffect>,
    pub healing: Option<HealingEffect>,
    pub conditions: Vec<ConditionEffect>,
    pub stat_modifiers: Vec<StatModifierEffect>,
    pub targeting: Targeting,
    pub action_cost: ActionCost,
    pub requires_concentration: bool,
    pub tags: Vec<String>,
}

impl AbilityDef {
    /// Create a bare ability; call the effect builders and then `validate`.
    pub fn new(name: impl Into<String>, source: AbilitySource, mechanism: Mechanism) -> Self {
        Self {
            id: AbilityId::new(),
            name: name.into(),
            description: String::new(),
            source,
            subtype: None,
            mechanism,
            damage: None,
            healing: None,
            conditions: Vec::new(),
            stat_modifiers: Vec::new(),
            targeting: Targeting::self_only(),
            action_cost: ActionCost::Action,
            requires_concentration: false,
            tags: Vec::new(),
        }
    }

    /// Create a leveled spell (level 0 is a free cantrip).
    pub fn spell(name: impl Into<String>, level: u32) -> Self {
        let mechanism = if level == 0 {
            Mechanism::Free
        } else {
            Mechanism::Slots { level }
        };
        let mut ability = Self::new(name, AbilitySource::Magic, mechanism);
        ability.subtype = Some("arcane".to_string());
        ability.tags.push("spell".to_string());
        ability
    }

    /// Create a cooldown-gated tech ability.
    pub fn tech(name: impl Into<String>, max_uses: u32) -> Self {
        let mut ability = Self::new(
            name,
            AbilitySource::Tech,
            Mechanism::Cooldown {
                max_uses,
                recharge_on: Vec::new(),
                recharge_die: 6,
                recharge_on_rest: Some("short".to_string()),
            },
        );
        ability.subtype = Some("cybertech".to_string());
        ability.tags.push("tech".to_string());
        ability
    }

    /// Create a martial technique costing momentum or stress.
    pub fn martial(name: impl Into<String>, momentum_cost: u32, stress_cost: u32) -> Self {
        let mechanism = if momentum_cost > 0 {
            Mechanism::Momentum { cost: momentum_cost }
        } else if stress_cost > 0 {
            Mechanism::Stress { cost: stress_cost }
        } else {
            Mechanism::Free
        };
        let mut ability = Self::new(name, AbilitySource::Martial, mechanism);
        ability.subtype = Some("maneuver".to_string());
        ability.tags.push("martial".to_string());
        ability
    }

    pub fn with_damage(mut self, dice: impl Into<String>, damage_type: impl Into<String>) -> Self {
        self.damage = Some(DamageEffect {
            dice: dice.into(),
            damage_type: damage_type.into(),
            save_ability: None,
            save_for_half: false,
        });
        self
    }

    pub fn with_healing(mut self, dice: impl Into<String>, flat: i32) -> Self {
        self.healing = Some(HealingEffect {
            dice: Some(dice.into()),
            flat,
            temp_hp: false,
        });
        self
    }

    pub fn with_condition(mut self, effect: ConditionEffect) -> Self {
        self.conditions.push(effect);
        self
    }

    pub fn with_stat_modifier(mut self, stat: impl Into<String>, modifier: i32, rounds: u32) -> Self {
        self.stat_modifiers.push(StatModifierEffect {
            stat: stat.into(),
            modifier,
            duration_rounds: Some(rounds),
        });
        self
    }

    pub fn with_targeting(mut self, targeting: Targeting) -> Self {
        self.targeting = targeting;
        self
    }

    pub fn concentration(mut self) -> Self {
        self.requires_concentration = true;
        self
    }

    pub fn has_effects(&self) -> bool {
        self.damage.is_some()
            || self.healing.is_some()
            || !self.conditions.is_empty()
            || !self.stat_modifiers.is_empty()
    }

    /// Spell level, if this is a spell (cantrips are level 0).
    pub fn spell_level(&self) -> Option<u32> {
        if self.source != AbilitySource::Magic {
            return None;
        }
        match &self.mechanism {
            Mechanism::Slots { level } => Some(*level),
            Mechanism::Free => Some(0),
            _ => None,
        }
    }

    /// Validate the schema: mechanism parameters in range, at least one
    /// effect present, area targeting sized.
    pub fn validate(&self) -> MechResult<()> {
        match &self.mechanism {
            Mechanism::Slots { level } => {
                if *level > 9 {
                    return Err(MechError::InvalidAbility(format!(
                        "{}: spell level {level} outside [0, 9]",
                        self.name
                    )));
                }
            }
            Mechanism::Cooldown { max_uses, .. } => {
                if *max_uses < 1 {
                    return Err(MechError::InvalidAbility(format!(
                        "{}: cooldown requires max_uses >= 1",
                        self.name
                    )));
                }
            }
            Mechanism::UsageDie { die } => {
                if ![4, 6, 8, 10, 12].contains(die) {
                    return Err(MechError::InvalidAbility(format!(
                        "{}: {die} is not a usage die size",
                        self.name
                    )));
                }
            }
            Mechanism::Stress { .. } | Mechanism::Momentum { .. } | Mechanism::Free => {}
        }

        if !self.has_effects() {
            return Err(MechError::InvalidAbility(format!(
                "{}: ability has no effects",
                self.name
            )));
        }

        if self.targeting.kind.is_area() && self.targeting.area_size_ft.is_none() {
            return Err(MechError::InvalidAbility(format!(
                "{}: area targeting requires an area size",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cantrip_is_free() {
        let cantrip = AbilityDef::spell("Fire Bolt", 0).with_damage("1d10", "fire");
        assert_eq!(cantrip.mechanism, Mechanism::Free);
        assert_eq!(cantrip.spell_level(), Some(0));
        assert!(cantrip.validate().is_ok());
    }

    #[test]
    fn leveled_spell_uses_slots() {
        let spell = AbilityDef::spell("Fireball", 3).with_damage("8d6", "fire");
        assert_eq!(spell.mechanism, Mechanism::Slots { level: 3 });
        assert_eq!(spell.spell_level(), Some(3));
    }

    #[test]
    fn spell_level_out_of_range_rejected() {
        let spell = AbilityDef::spell("Wish Plus", 10).with_damage("1d4", "force");
        assert!(spell.validate().is_err());
    }

    #[test]
    fn cooldown_requires_uses() {
        let mut tech = AbilityDef::tech("Shock Coil", 2).with_damage("2d8", "lightning");
        assert!(tech.validate().is_ok());
        tech.mechanism = Mechanism::Cooldown {
            max_uses: 0,
            recharge_on: Vec::new(),
            recharge_die: 6,
            recharge_on_rest: None,
        };
        assert!(tech.validate().is_err());
    }

    #[test]
    fn ability_without_effects_rejected() {
        let empty = AbilityDef::spell("Mumble", 1);
        assert!(matches!(empty.validate(), Err(MechError::InvalidAbility(_))));
    }

    #[test]
    fn area_targeting_requires_size() {
        let mut spell = AbilityDef::spell("Fireball", 3).with_damage("8d6", "fire");
        spell.targeting = Targeting {
            kind: TargetingKind::AreaSphere,
            range_ft: 150,
            area_size_ft: None,
            max_targets: None,
        };
        assert!(spell.validate().is_err());

        spell.targeting = Targeting::sphere(150, 20);
        assert!(spell.validate().is_ok());
    }

    #[test]
    fn martial_mechanism_from_costs() {
        assert_eq!(
            AbilityDef::martial("Whirlwind", 2, 0).mechanism,
            Mechanism::Momentum { cost: 2 }
        );
        assert_eq!(
            AbilityDef::martial("Reckless Surge", 0, 3).mechanism,
            Mechanism::Stress { cost: 3 }
        );
        assert_eq!(AbilityDef::martial("Jab", 0, 0).mechanism, Mechanism::Free);
    }

    #[test]
    fn serde_round_trip() {
        let spell = AbilityDef::spell("Hold Person", 2)
            .with_condition(ConditionEffect {
                condition: ConditionType::Paralyzed,
                duration_rounds: None,
                until_save: true,
                save_ability: Some(AbilityScore::Wisdom),
            })
            .concentration();
        let json = serde_json::to_string(&spell).unwrap();
        let back: AbilityDef = serde_json::from_str(&json).unwrap();
        assert_eq!(spell, back);
    }
}
