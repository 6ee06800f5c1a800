use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ids::{AbilityId, EntityId, UniverseId};
use crate::resources::ResourcePool;

/// The kind of an entity. A closed set — polymorphism is a tagged variant,
/// not a class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A person or creature, player-controlled or not.
    Character,
    /// A place with exits and a danger level.
    Location,
    /// A physical object that can be carried, wielded, or lost.
    Item,
    /// An organization or political body.
    Faction,
    /// A scenery object with no specialized stats.
    Object,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character => write!(f, "character"),
            Self::Location => write!(f, "location"),
            Self::Item => write!(f, "item"),
            Self::Faction => write!(f, "faction"),
            Self::Object => write!(f, "object"),
        }
    }
}

impl EntityKind {
    /// Parse a kind from its snake_case name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "character" => Some(Self::Character),
            "location" => Some(Self::Location),
            "item" => Some(Self::Item),
            "faction" => Some(Self::Faction),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// The six ability scores, each in `[1, 30]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// The six abilities, used to address scores, saves, and save proficiencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    /// Short SRD-style name ("str", "dex", ...).
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::Strength => "str",
            Self::Dexterity => "dex",
            Self::Constitution => "con",
            Self::Intelligence => "int",
            Self::Wisdom => "wis",
            Self::Charisma => "cha",
        }
    }

    /// Parse from either the full or the abbreviated name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "str" | "strength" => Some(Self::Strength),
            "dex" | "dexterity" => Some(Self::Dexterity),
            "con" | "constitution" => Some(Self::Constitution),
            "int" | "intelligence" => Some(Self::Intelligence),
            "wis" | "wisdom" => Some(Self::Wisdom),
            "cha" | "charisma" => Some(Self::Charisma),
            _ => None,
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbrev())
    }
}

impl AbilityScores {
    /// Get a score by ability.
    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Ability modifier: `floor((score - 10) / 2)`.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) - 10).div_euclid(2)
    }

    /// Validate that every score is in `[1, 30]`.
    pub fn validate(&self) -> CoreResult<()> {
        for ability in [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ] {
            let score = self.get(ability);
            if !(1..=30).contains(&score) {
                return Err(CoreError::Validation(format!(
                    "{ability} score {score} outside [1, 30]"
                )));
            }
        }
        Ok(())
    }
}

/// Hit dice available for short-rest healing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitDice {
    /// Sides on the hit die (6, 8, 10, 12).
    pub sides: u32,
    /// Total dice at full strength (equals level).
    pub total: u32,
    /// Dice currently available to spend.
    pub current: u32,
}

impl HitDice {
    pub fn new(sides: u32, total: u32) -> Self {
        Self {
            sides,
            total,
            current: total,
        }
    }

    /// Spend up to `count` dice. Returns how many were actually spent.
    pub fn spend(&mut self, count: u32) -> u32 {
        let spent = count.min(self.current);
        self.current -= spent;
        spent
    }

    /// Recover up to `count` dice. Returns how many were actually recovered.
    pub fn recover(&mut self, count: u32) -> u32 {
        let recovered = count.min(self.total - self.current);
        self.current += recovered;
        recovered
    }
}

/// Death-save counters, tracked while a character is at 0 HP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

impl DeathSaves {
    /// Three successes: stabilized.
    pub fn is_stable(&self) -> bool {
        self.successes >= 3
    }

    /// Three failures: dead.
    pub fn is_dead(&self) -> bool {
        self.failures >= 3
    }

    pub fn reset(&mut self) {
        self.successes = 0;
        self.failures = 0;
    }
}

/// Combat and mechanical stats for characters and monsters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterStats {
    pub hp_current: i32,
    pub hp_max: i32,
    pub hp_temp: i32,
    pub ac: i32,
    /// Movement speed in feet.
    pub speed: i32,
    pub abilities: AbilityScores,
    pub level: u32,
    /// Hit dice of a monster statblock; used by the fray die's mook filter.
    pub hit_dice_rating: u32,
    pub hit_dice: HitDice,
    pub death_saves: DeathSaves,
    pub resources: ResourcePool,
    /// faction entity id -> signed standing
    pub faction_reputation: BTreeMap<EntityId, i32>,
    /// Lower-case skill names the character is proficient in.
    pub skill_proficiencies: BTreeSet<String>,
    pub save_proficiencies: BTreeSet<Ability>,
    /// Lower-case weapon names the character is proficient with.
    pub weapon_proficiencies: BTreeSet<String>,
    /// Abilities known by this character.
    pub known_abilities: Vec<AbilityId>,
}

impl CharacterStats {
    /// Create stats for a fresh level-1 character.
    pub fn new(hp_max: i32, ac: i32) -> Self {
        Self {
            hp_current: hp_max,
            hp_max,
            hp_temp: 0,
            ac,
            speed: 30,
            abilities: AbilityScores::default(),
            level: 1,
            hit_dice_rating: 1,
            hit_dice: HitDice::new(8, 1),
            death_saves: DeathSaves::default(),
            resources: ResourcePool::default(),
            faction_reputation: BTreeMap::new(),
            skill_proficiencies: BTreeSet::new(),
            save_proficiencies: BTreeSet::new(),
            weapon_proficiencies: BTreeSet::new(),
            known_abilities: Vec::new(),
        }
    }

    /// Proficiency bonus derived from level via the 5e table.
    pub fn proficiency_bonus(&self) -> i32 {
        2 + ((self.level.saturating_sub(1)) / 4) as i32
    }

    /// Apply damage, consuming temporary HP first. HP is clamped at 0.
    /// Returns the actual reduction to real HP.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let mut remaining = amount.max(0);
        let absorbed = remaining.min(self.hp_temp);
        self.hp_temp -= absorbed;
        remaining -= absorbed;
        let before = self.hp_current;
        self.hp_current = (self.hp_current - remaining).max(0);
        before - self.hp_current
    }

    /// Heal up to `hp_max`. Returns the actual amount healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp_current;
        self.hp_current = (self.hp_current + amount.max(0)).min(self.hp_max);
        self.hp_current - before
    }

    pub fn is_down(&self) -> bool {
        self.hp_current == 0
    }
}

/// Location-specific stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStats {
    /// Flavor type: tavern, dungeon, market, forest, ...
    pub location_type: String,
    /// direction -> destination location entity. May be asymmetric.
    pub exits: BTreeMap<String, EntityId>,
    /// 0 = safe, 20 = deadly.
    pub danger_level: u8,
    pub region: Option<String>,
    pub terrain: Option<String>,
}

impl LocationStats {
    pub fn new(location_type: impl Into<String>, danger_level: u8) -> Self {
        Self {
            location_type: location_type.into(),
            exits: BTreeMap::new(),
            danger_level: danger_level.min(20),
            region: None,
            terrain: None,
        }
    }
}

/// Item rarity grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    VeryRare,
    Legendary,
    Artifact,
}

/// Item-specific stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStats {
    /// Weight in pounds.
    pub weight: f64,
    /// Value in copper pieces.
    pub value_copper: u32,
    /// Damage dice if this is a weapon (e.g. "1d8").
    pub damage_dice: Option<String>,
    pub damage_type: Option<String>,
    /// AC bonus if this is armor.
    pub armor_bonus: Option<i32>,
    pub rarity: Rarity,
    pub magical: bool,
    pub consumable: bool,
    /// A DEX-based weapon (finesse or ranged) attacks with DEX.
    pub finesse: bool,
    pub ranged: bool,
}

impl Default for ItemStats {
    fn default() -> Self {
        Self {
            weight: 0.0,
            value_copper: 0,
            damage_dice: None,
            damage_type: None,
            armor_bonus: None,
            rarity: Rarity::Common,
            magical: false,
            consumable: false,
            finesse: false,
            ranged: false,
        }
    }
}

/// Faction-specific stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactionStats {
    pub alignment: Option<String>,
    /// Political influence 0-100.
    pub influence: u8,
    /// Wealth in gold pieces.
    pub wealth: u32,
}

/// Kind-tagged stats substructure. The discriminant doubles as the entity
/// kind — an entity cannot carry stats of the wrong variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stats {
    Character(CharacterStats),
    Location(LocationStats),
    Item(ItemStats),
    Faction(FactionStats),
    Object,
}

impl Stats {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Character(_) => EntityKind::Character,
            Self::Location(_) => EntityKind::Location,
            Self::Item(_) => EntityKind::Item,
            Self::Faction(_) => EntityKind::Faction,
            Self::Object => EntityKind::Object,
        }
    }
}

/// Core entity record. Every world object is an `Entity`.
///
/// Entities are mutated only through events; `version` increments on every
/// save so the truth store can detect stale writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub universe_id: UniverseId,
    /// Unique within its universe.
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub stats: Stats,
    /// Monotonic save counter. `save_entity` with an equal version is a no-op;
    /// a lower version is a stale-write conflict.
    pub version: u64,
    /// Soft-delete flag. Lost items and dead characters stay in the record.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity with a random id.
    pub fn new(universe_id: UniverseId, name: impl Into<String>, stats: Stats) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            universe_id,
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            stats,
            version: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a character with default ability scores.
    pub fn character(universe_id: UniverseId, name: impl Into<String>, hp_max: i32, ac: i32) -> Self {
        Self::new(universe_id, name, Stats::Character(CharacterStats::new(hp_max, ac)))
    }

    /// Create a location.
    pub fn location(
        universe_id: UniverseId,
        name: impl Into<String>,
        location_type: impl Into<String>,
        danger_level: u8,
    ) -> Self {
        Self::new(
            universe_id,
            name,
            Stats::Location(LocationStats::new(location_type, danger_level)),
        )
    }

    /// Create an item.
    pub fn item(universe_id: UniverseId, name: impl Into<String>, stats: ItemStats) -> Self {
        Self::new(universe_id, name, Stats::Item(stats))
    }

    pub fn kind(&self) -> EntityKind {
        self.stats.kind()
    }

    pub fn is_character(&self) -> bool {
        self.kind() == EntityKind::Character
    }

    pub fn is_location(&self) -> bool {
        self.kind() == EntityKind::Location
    }

    pub fn is_item(&self) -> bool {
        self.kind() == EntityKind::Item
    }

    /// Character stats, if this is a character.
    pub fn character_stats(&self) -> Option<&CharacterStats> {
        match &self.stats {
            Stats::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn character_stats_mut(&mut self) -> Option<&mut CharacterStats> {
        match &mut self.stats {
            Stats::Character(c) => Some(c),
            _ => None,
        }
    }

    /// Location stats, if this is a location.
    pub fn location_stats(&self) -> Option<&LocationStats> {
        match &self.stats {
            Stats::Location(l) => Some(l),
            _ => None,
        }
    }

    pub fn location_stats_mut(&mut self) -> Option<&mut LocationStats> {
        match &mut self.stats {
            Stats::Location(l) => Some(l),
            _ => None,
        }
    }

    /// Item stats, if this is an item.
    pub fn item_stats(&self) -> Option<&ItemStats> {
        match &self.stats {
            Stats::Item(i) => Some(i),
            _ => None,
        }
    }

    pub fn item_stats_mut(&mut self) -> Option<&mut ItemStats> {
        match &mut self.stats {
            Stats::Item(i) => Some(i),
            _ => None,
        }
    }

    /// Validate stat invariants: HP within bounds, scores within [1, 30],
    /// level at least 1.
    pub fn validate(&self) -> CoreResult<()> {
        if let Stats::Character(c) = &self.stats {
            if c.hp_current < 0 || c.hp_current > c.hp_max {
                return Err(CoreError::Validation(format!(
                    "hp {} outside [0, {}]",
                    c.hp_current, c.hp_max
                )));
            }
            if c.level < 1 {
                return Err(CoreError::Validation("level must be at least 1".into()));
            }
            c.abilities.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ability_modifier_floors() {
        let mut scores = AbilityScores::default();
        scores.strength = 16;
        scores.dexterity = 9;
        scores.charisma = 7;
        assert_eq!(scores.modifier(Ability::Strength), 3);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Charisma), -2);
        assert_eq!(scores.modifier(Ability::Constitution), 0);
    }

    #[test]
    fn proficiency_bonus_table() {
        let mut stats = CharacterStats::new(10, 10);
        let expected = [(1, 2), (4, 2), (5, 3), (8, 3), (9, 4), (13, 5), (17, 6), (20, 6)];
        for (level, bonus) in expected {
            stats.level = level;
            assert_eq!(stats.proficiency_bonus(), bonus, "level {level}");
        }
    }

    #[test]
    fn damage_consumes_temp_hp_first() {
        let mut stats = CharacterStats::new(20, 12);
        stats.hp_temp = 5;
        let real = stats.take_damage(8);
        assert_eq!(stats.hp_temp, 0);
        assert_eq!(stats.hp_current, 17);
        assert_eq!(real, 3);
    }

    #[test]
    fn damage_clamps_at_zero() {
        let mut stats = CharacterStats::new(10, 10);
        stats.take_damage(100);
        assert_eq!(stats.hp_current, 0);
        assert!(stats.is_down());
    }

    #[test]
    fn heal_clamps_at_max() {
        let mut stats = CharacterStats::new(10, 10);
        stats.hp_current = 4;
        assert_eq!(stats.heal(20), 6);
        assert_eq!(stats.hp_current, 10);
    }

    #[test]
    fn hit_dice_spend_and_recover() {
        let mut hd = HitDice::new(8, 4);
        assert_eq!(hd.spend(2), 2);
        assert_eq!(hd.current, 2);
        assert_eq!(hd.spend(5), 2);
        assert_eq!(hd.current, 0);
        assert_eq!(hd.recover(3), 3);
        assert_eq!(hd.recover(10), 1);
    }

    #[test]
    fn stats_kind_matches_variant() {
        let universe = UniverseId::new();
        assert_eq!(Entity::character(universe, "Kael", 10, 12).kind(), EntityKind::Character);
        assert_eq!(
            Entity::location(universe, "Tavern", "tavern", 2).kind(),
            EntityKind::Location
        );
    }

    #[test]
    fn validate_rejects_out_of_range_scores() {
        let universe = UniverseId::new();
        let mut entity = Entity::character(universe, "Kael", 10, 12);
        entity
            .character_stats_mut()
            .unwrap()
            .abilities
            .strength = 31;
        assert!(entity.validate().is_err());
    }

    #[test]
    fn validate_rejects_hp_over_max() {
        let universe = UniverseId::new();
        let mut entity = Entity::character(universe, "Kael", 10, 12);
        entity.character_stats_mut().unwrap().hp_current = 11;
        assert!(entity.validate().is_err());
    }

    #[test]
    fn ability_parse_variants() {
        assert_eq!(Ability::parse("STR"), Some(Ability::Strength));
        assert_eq!(Ability::parse("wisdom"), Some(Ability::Wisdom));
        assert_eq!(Ability::parse("luck"), None);
    }
}
