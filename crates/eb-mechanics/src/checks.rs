//! Ability checks, saving throws, and attack resolution.
//!
//! The skill table, proficiency progression, and crit/fumble rules follow
//! the SRD. Advantage folds into the d20 roll as 2d20 keep-one; a source of
//! advantage and a source of disadvantage cancel to a straight roll no
//! matter how many of each apply.

use serde::{Deserialize, Serialize};

use eb_core::condition::ConditionType;
use eb_core::entity::{Ability, CharacterStats};

use crate::dice::{DiceExpr, DiceRoller};
use crate::error::{MechError, MechResult};

/// Advantage state for a d20 roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Fold sources together: any advantage plus any disadvantage is normal.
    pub fn combine(sources: &[Advantage]) -> Advantage {
        let has_adv = sources.contains(&Advantage::Advantage);
        let has_dis = sources.contains(&Advantage::Disadvantage);
        match (has_adv, has_dis) {
            (true, false) => Advantage::Advantage,
            (false, true) => Advantage::Disadvantage,
            _ => Advantage::Normal,
        }
    }
}

/// Roll a d20 under the given advantage state, returning the natural result.
pub fn roll_d20(advantage: Advantage, roller: &mut dyn DiceRoller) -> u32 {
    match advantage {
        Advantage::Normal => roller.roll_die(20),
        Advantage::Advantage => {
            let rolls = roller.roll(2, 20);
            rolls.into_iter().max().unwrap_or(1)
        }
        Advantage::Disadvantage => {
            let rolls = roller.roll(2, 20);
            rolls.into_iter().min().unwrap_or(1)
        }
    }
}

/// The 18 SRD skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

impl Skill {
    /// The ability each skill keys off.
    pub fn ability(self) -> Ability {
        match self {
            Self::Athletics => Ability::Strength,
            Self::Acrobatics | Self::SleightOfHand | Self::Stealth => Ability::Dexterity,
            Self::Arcana | Self::History | Self::Investigation | Self::Nature | Self::Religion => {
                Ability::Intelligence
            }
            Self::AnimalHandling | Self::Insight | Self::Medicine | Self::Perception | Self::Survival => {
                Ability::Wisdom
            }
            Self::Deception | Self::Intimidation | Self::Performance | Self::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Athletics => "athletics",
            Self::Acrobatics => "acrobatics",
            Self::SleightOfHand => "sleight_of_hand",
            Self::Stealth => "stealth",
            Self::Arcana => "arcana",
            Self::History => "history",
            Self::Investigation => "investigation",
            Self::Nature => "nature",
            Self::Religion => "religion",
            Self::AnimalHandling => "animal_handling",
            Self::Insight => "insight",
            Self::Medicine => "medicine",
            Self::Perception => "perception",
            Self::Survival => "survival",
            Self::Deception => "deception",
            Self::Intimidation => "intimidation",
            Self::Performance => "performance",
            Self::Persuasion => "persuasion",
        }
    }

    pub fn parse(s: &str) -> MechResult<Self> {
        let normalized = s.to_lowercase().replace([' ', '-'], "_");
        let all = [
            Self::Athletics,
            Self::Acrobatics,
            Self::SleightOfHand,
            Self::Stealth,
            Self::Arcana,
            Self::History,
            Self::Investigation,
            Self::Nature,
            Self::Religion,
            Self::AnimalHandling,
            Self::Insight,
            Self::Medicine,
            Self::Perception,
            Self::Survival,
            Self::Deception,
            Self::Intimidation,
            Self::Performance,
            Self::Persuasion,
        ];
        all.into_iter()
            .find(|skill| skill.name() == normalized)
            .ok_or(MechError::UnknownSkill(s.to_string()))
    }
}

/// Outcome of a skill check or saving throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub success: bool,
    /// The natural d20 result.
    pub roll: i32,
    pub total: i32,
    pub dc: i32,
    /// `total - dc`.
    pub margin: i32,
}

/// Roll a skill check against a DC.
pub fn skill_check(
    stats: &CharacterStats,
    skill: Skill,
    dc: i32,
    advantage: Advantage,
    roller: &mut dyn DiceRoller,
) -> CheckOutcome {
    let natural = roll_d20(advantage, roller) as i32;
    let mut modifier = stats.abilities.modifier(skill.ability());
    if stats.skill_proficiencies.contains(skill.name()) {
        modifier += stats.proficiency_bonus();
    }
    let total = natural + modifier;
    CheckOutcome {
        success: total >= dc,
        roll: natural,
        total,
        dc,
        margin: total - dc,
    }
}

/// Roll a saving throw against a DC.
pub fn saving_throw(
    stats: &CharacterStats,
    ability: Ability,
    dc: i32,
    advantage: Advantage,
    roller: &mut dyn DiceRoller,
) -> CheckOutcome {
    let natural = roll_d20(advantage, roller) as i32;
    let mut modifier = stats.abilities.modifier(ability);
    if stats.save_proficiencies.contains(&ability) {
        modifier += stats.proficiency_bonus();
    }
    let total = natural + modifier;
    CheckOutcome {
        success: total >= dc,
        roll: natural,
        total,
        dc,
        margin: total - dc,
    }
}

/// Cover between attacker and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cover {
    #[default]
    None,
    Half,
    ThreeQuarters,
}

impl Cover {
    /// AC bonus granted to the target.
    pub fn ac_bonus(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Half => 2,
            Self::ThreeQuarters => 5,
        }
    }
}

/// A weapon used in an attack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    /// Damage dice notation, e.g. "1d8".
    pub damage_dice: String,
    pub damage_type: String,
    /// Finesse and ranged weapons attack with DEX.
    pub finesse: bool,
    pub ranged: bool,
    /// Flat attack/damage bonus from enchantment (+1, +2, ...).
    pub bonus: i32,
}

impl Weapon {
    pub fn new(name: impl Into<String>, damage_dice: impl Into<String>, damage_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            damage_dice: damage_dice.into(),
            damage_type: damage_type.into(),
            finesse: false,
            ranged: false,
            bonus: 0,
        }
    }
}

/// Outcome of an attack roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub hit: bool,
    pub critical: bool,
    pub fumble: bool,
    /// The natural d20 result.
    pub attack_roll: i32,
    pub total_attack: i32,
    pub target_ac: i32,
    pub damage: Option<i32>,
    pub damage_type: Option<String>,
    /// Individual damage die results, for display.
    pub damage_rolls: Vec<u32>,
}

/// Resolve a weapon attack.
///
/// Natural 20 is an automatic hit with doubled damage dice; natural 1 is an
/// automatic miss regardless of the total. Otherwise the total is compared
/// to the target's AC including cover.
pub fn resolve_attack(
    attacker: &CharacterStats,
    target_ac: i32,
    cover: Cover,
    weapon: &Weapon,
    advantage: Advantage,
    auto_crit: bool,
    roller: &mut dyn DiceRoller,
) -> MechResult<AttackOutcome> {
    let natural = roll_d20(advantage, roller) as i32;
    let ability = if weapon.finesse || weapon.ranged {
        Ability::Dexterity
    } else {
        Ability::Strength
    };
    let mut modifier = attacker.abilities.modifier(ability) + weapon.bonus;
    if attacker.weapon_proficiencies.contains(&weapon.name.to_lowercase()) {
        modifier += attacker.proficiency_bonus();
    }
    let total = natural + modifier;
    let effective_ac = target_ac + cover.ac_bonus();

    let fumble = natural == 1;
    let critical = !fumble && (natural == 20 || auto_crit);
    let hit = !fumble && (natural == 20 || total >= effective_ac);

    let mut outcome = AttackOutcome {
        hit,
        critical: critical && hit,
        fumble,
        attack_roll: natural,
        total_attack: total,
        target_ac: effective_ac,
        damage: None,
        damage_type: None,
        damage_rolls: Vec::new(),
    };

    if hit {
        let mut expr = DiceExpr::parse(&weapon.damage_dice)?;
        if outcome.critical {
            expr = expr.double_dice();
        }
        let damage_roll = expr.roll(roller);
        let damage_mod = attacker.abilities.modifier(ability) + weapon.bonus;
        outcome.damage = Some((damage_roll.total + damage_mod).max(0));
        outcome.damage_type = Some(weapon.damage_type.clone());
        outcome.damage_rolls = damage_roll.rolls;
    }

    Ok(outcome)
}

/// Net advantage state and auto-crit flag for an attack, derived from the
/// attacker's and target's conditions.
///
/// Rule deltas: blinded attackers roll at disadvantage and are easier to
/// hit; a prone target grants advantage to adjacent melee attacks but
/// imposes disadvantage at range; paralyzed and unconscious targets are hit
/// automatically hard — melee hits against them are critical.
pub fn attack_advantage(
    attacker_conditions: &[ConditionType],
    target_conditions: &[ConditionType],
    melee: bool,
) -> (Advantage, bool) {
    let mut sources = Vec::new();

    for condition in attacker_conditions {
        match condition {
            ConditionType::Blinded
            | ConditionType::Poisoned
            | ConditionType::Frightened
            | ConditionType::Restrained
            | ConditionType::Prone => sources.push(Advantage::Disadvantage),
            ConditionType::Invisible => sources.push(Advantage::Advantage),
            _ => {}
        }
    }

    let mut auto_crit = false;
    for condition in target_conditions {
        match condition {
            ConditionType::Blinded | ConditionType::Restrained | ConditionType::Stunned => {
                sources.push(Advantage::Advantage)
            }
            ConditionType::Paralyzed | ConditionType::Unconscious | ConditionType::Petrified => {
                sources.push(Advantage::Advantage);
                if melee {
                    auto_crit = true;
                }
            }
            ConditionType::Invisible => sources.push(Advantage::Disadvantage),
            ConditionType::Prone => sources.push(if melee {
                Advantage::Advantage
            } else {
                Advantage::Disadvantage
            }),
            _ => {}
        }
    }

    (Advantage::combine(&sources), auto_crit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedRoller;
    use eb_core::entity::AbilityScores;

    fn fighter() -> CharacterStats {
        let mut stats = CharacterStats::new(20, 16);
        stats.abilities = AbilityScores {
            strength: 16,
            dexterity: 14,
            constitution: 14,
            intelligence: 10,
            wisdom: 12,
            charisma: 8,
        };
        stats.level = 1;
        stats.weapon_proficiencies.insert("longsword".to_string());
        stats.skill_proficiencies.insert("athletics".to_string());
        stats.save_proficiencies.insert(Ability::Constitution);
        stats
    }

    #[test]
    fn skill_ability_table() {
        assert_eq!(Skill::Athletics.ability(), Ability::Strength);
        assert_eq!(Skill::Stealth.ability(), Ability::Dexterity);
        assert_eq!(Skill::Arcana.ability(), Ability::Intelligence);
        assert_eq!(Skill::Perception.ability(), Ability::Wisdom);
        assert_eq!(Skill::Persuasion.ability(), Ability::Charisma);
    }

    #[test]
    fn skill_parse() {
        assert_eq!(Skill::parse("Animal Handling").unwrap(), Skill::AnimalHandling);
        assert_eq!(Skill::parse("stealth").unwrap(), Skill::Stealth);
        assert!(Skill::parse("lockpicking").is_err());
    }

    #[test]
    fn skill_check_adds_proficiency() {
        let stats = fighter();
        // Athletics: +3 STR, +2 proficiency.
        let outcome = skill_check(&stats, Skill::Athletics, 15, Advantage::Normal, &mut ScriptedRoller::new(vec![10]));
        assert_eq!(outcome.total, 15);
        assert!(outcome.success);
        assert_eq!(outcome.margin, 0);

        // Stealth: +2 DEX only.
        let outcome = skill_check(&stats, Skill::Stealth, 15, Advantage::Normal, &mut ScriptedRoller::new(vec![10]));
        assert_eq!(outcome.total, 12);
        assert!(!outcome.success);
        assert_eq!(outcome.margin, -3);
    }

    #[test]
    fn saving_throw_uses_save_proficiencies() {
        let stats = fighter();
        let outcome = saving_throw(&stats, Ability::Constitution, 14, Advantage::Normal, &mut ScriptedRoller::new(vec![10]));
        assert_eq!(outcome.total, 14); // 10 + 2 CON + 2 prof
        assert!(outcome.success);

        let outcome = saving_throw(&stats, Ability::Wisdom, 14, Advantage::Normal, &mut ScriptedRoller::new(vec![10]));
        assert_eq!(outcome.total, 11); // 10 + 1 WIS
        assert!(!outcome.success);
    }

    #[test]
    fn advantage_takes_higher_die() {
        let stats = fighter();
        let outcome = skill_check(&stats, Skill::Stealth, 10, Advantage::Advantage, &mut ScriptedRoller::new(vec![4, 17]));
        assert_eq!(outcome.roll, 17);

        let outcome = skill_check(&stats, Skill::Stealth, 10, Advantage::Disadvantage, &mut ScriptedRoller::new(vec![4, 17]));
        assert_eq!(outcome.roll, 4);
    }

    #[test]
    fn advantage_combination_cancels() {
        assert_eq!(
            Advantage::combine(&[Advantage::Advantage, Advantage::Disadvantage, Advantage::Advantage]),
            Advantage::Normal
        );
        assert_eq!(Advantage::combine(&[Advantage::Advantage]), Advantage::Advantage);
        assert_eq!(Advantage::combine(&[]), Advantage::Normal);
    }

    #[test]
    fn natural_twenty_crits_and_doubles_dice() {
        let stats = fighter();
        let mut weapon = Weapon::new("longsword", "1d8", "slashing");
        weapon.bonus = 2;
        // d20 = 20, crit damage dice 2d8 = [5, 7].
        let outcome = resolve_attack(
            &stats,
            14,
            Cover::None,
            &weapon,
            Advantage::Normal,
            false,
            &mut ScriptedRoller::new(vec![20, 5, 7]),
        )
        .unwrap();
        assert!(outcome.hit);
        assert!(outcome.critical);
        assert_eq!(outcome.attack_roll, 20);
        assert_eq!(outcome.total_attack, 27); // 20 + 3 STR + 2 prof + 2 weapon
        assert_eq!(outcome.damage, Some(17)); // 5 + 7 + 3 STR + 2 weapon
        assert_eq!(outcome.damage_type.as_deref(), Some("slashing"));
    }

    #[test]
    fn natural_one_misses_even_with_high_total() {
        let stats = fighter();
        let weapon = Weapon::new("longsword", "1d8", "slashing");
        let outcome = resolve_attack(
            &stats,
            2,
            Cover::None,
            &weapon,
            Advantage::Normal,
            false,
            &mut ScriptedRoller::new(vec![1]),
        )
        .unwrap();
        assert!(outcome.fumble);
        assert!(!outcome.hit);
        assert_eq!(outcome.damage, None);
    }

    #[test]
    fn natural_twenty_hits_even_below_ac() {
        let stats = fighter();
        let weapon = Weapon::new("longsword", "1d8", "slashing");
        let outcome = resolve_attack(
            &stats,
            40,
            Cover::None,
            &weapon,
            Advantage::Normal,
            false,
            &mut ScriptedRoller::new(vec![20, 4, 4]),
        )
        .unwrap();
        assert!(outcome.hit);
        assert!(outcome.critical);
    }

    #[test]
    fn cover_raises_effective_ac() {
        let stats = fighter();
        let weapon = Weapon::new("longsword", "1d8", "slashing");
        // 10 + 3 + 2 = 15 vs AC 14: hit without cover...
        let outcome = resolve_attack(
            &stats,
            14,
            Cover::None,
            &weapon,
            Advantage::Normal,
            false,
            &mut ScriptedRoller::new(vec![10, 6]),
        )
        .unwrap();
        assert!(outcome.hit);
        // ...but a miss behind half cover (AC 16).
        let outcome = resolve_attack(
            &stats,
            14,
            Cover::Half,
            &weapon,
            Advantage::Normal,
            false,
            &mut ScriptedRoller::new(vec![10]),
        )
        .unwrap();
        assert!(!outcome.hit);
        assert_eq!(outcome.target_ac, 16);
    }

    #[test]
    fn ranged_weapon_uses_dex() {
        let stats = fighter();
        let mut bow = Weapon::new("shortbow", "1d6", "piercing");
        bow.ranged = true;
        let outcome = resolve_attack(
            &stats,
            10,
            Cover::None,
            &bow,
            Advantage::Normal,
            false,
            &mut ScriptedRoller::new(vec![10, 3]),
        )
        .unwrap();
        // 10 + 2 DEX, no proficiency with shortbow.
        assert_eq!(outcome.total_attack, 12);
        assert_eq!(outcome.damage, Some(5)); // 3 + 2 DEX
    }

    #[test]
    fn condition_interplay_prone_target() {
        let (advantage, auto_crit) = attack_advantage(&[], &[ConditionType::Prone], true);
        assert_eq!(advantage, Advantage::Advantage);
        assert!(!auto_crit);

        let (advantage, _) = attack_advantage(&[], &[ConditionType::Prone], false);
        assert_eq!(advantage, Advantage::Disadvantage);
    }

    #[test]
    fn condition_interplay_blinded_attacker_cancels_blinded_target() {
        let (advantage, _) =
            attack_advantage(&[ConditionType::Blinded], &[ConditionType::Blinded], true);
        assert_eq!(advantage, Advantage::Normal);
    }

    #[test]
    fn paralyzed_target_auto_crits_in_melee() {
        let (advantage, auto_crit) = attack_advantage(&[], &[ConditionType::Paralyzed], true);
        assert_eq!(advantage, Advantage::Advantage);
        assert!(auto_crit);

        let (_, auto_crit) = attack_advantage(&[], &[ConditionType::Paralyzed], false);
        assert!(!auto_crit);
    }

    #[test]
    fn auto_crit_applies_on_ordinary_hit() {
        let stats = fighter();
        let weapon = Weapon::new("longsword", "1d8", "slashing");
        let outcome = resolve_attack(
            &stats,
            10,
            Cover::None,
            &weapon,
            Advantage::Normal,
            true,
            &mut ScriptedRoller::new(vec![12, 4, 4]),
        )
        .unwrap();
        assert!(outcome.hit);
        assert!(outcome.critical);
        assert_eq!(outcome.damage, Some(11)); // 4 + 4 + 3 STR
    }
}
