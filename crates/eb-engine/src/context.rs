//! Turn data types: intents in, skill results and turn results out.

use serde::{Deserialize, Serialize};

use eb_core::ids::{AbilityId, EntityId, EventId, UniverseId};
use eb_core::relationship::RelationshipKind;

/// Categories of player intent. A closed dispatch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    // Combat
    Attack,
    CastSpell,
    UseAbility,

    // Social
    Talk,
    Persuade,
    Intimidate,
    Deceive,

    // Exploration
    Move,
    Look,
    Search,
    Interact,

    // Items
    UseItem,
    PickUp,
    Drop,
    Give,

    // Meta
    Rest,
    Wait,
    AskQuestion,

    // Special
    Fork,
    Unclear,
}

impl IntentKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::CastSpell => "cast_spell",
            Self::UseAbility => "use_ability",
            Self::Talk => "talk",
            Self::Persuade => "persuade",
            Self::Intimidate => "intimidate",
            Self::Deceive => "deceive",
            Self::Move => "move",
            Self::Look => "look",
            Self::Search => "search",
            Self::Interact => "interact",
            Self::UseItem => "use_item",
            Self::PickUp => "pick_up",
            Self::Drop => "drop",
            Self::Give => "give",
            Self::Rest => "rest",
            Self::Wait => "wait",
            Self::AskQuestion => "ask_question",
            Self::Fork => "fork",
            Self::Unclear => "unclear",
        }
    }
}

/// A structured player intent. Parsing natural language into this shape is
/// the shell's job; the core begins here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    /// Target name as the player said it.
    pub target_name: Option<String>,
    /// Resolved target, when the shell already knows it.
    pub target_id: Option<EntityId>,
    /// Ability to use for `UseAbility` / `CastSpell`.
    pub ability_id: Option<AbilityId>,
    /// Exit direction or destination for `Move`.
    pub destination: Option<String>,
    /// Spoken words for `Talk`.
    pub dialogue: Option<String>,
    /// "long" to request a long rest.
    pub rest_kind: Option<String>,
    /// Fork name/reason for `Fork`.
    pub fork_reason: Option<String>,
    /// DC override for checks, when the shell has judged the stakes.
    pub difficulty: Option<i32>,
    pub original_input: String,
}

impl Intent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            target_name: None,
            target_id: None,
            ability_id: None,
            destination: None,
            dialogue: None,
            rest_kind: None,
            fork_reason: None,
            difficulty: None,
            original_input: String::new(),
        }
    }

    pub fn targeting(mut self, target: EntityId) -> Self {
        self.target_id = Some(target);
        self
    }

    pub fn named_target(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    pub fn toward(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Lightweight entity info carried in context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub name: String,
    pub kind: String,
    pub hp_current: Option<i32>,
    pub hp_max: Option<i32>,
    pub ac: Option<i32>,
}

/// A relationship the actor has with someone present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownEntity {
    pub entity: EntitySummary,
    pub kind: RelationshipKind,
    pub trust: Option<f64>,
}

/// World state loaded for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub universe_id: UniverseId,
    pub actor: EntitySummary,
    pub location: EntitySummary,
    pub location_type: String,
    pub danger_level: u8,
    pub exits: Vec<String>,
    pub entities_present: Vec<EntitySummary>,
    pub inventory: Vec<EntitySummary>,
    pub known_entities: Vec<KnownEntity>,
    /// Recent event summaries, newest last.
    pub recent_events: Vec<String>,
}

/// The structured outcome of one resolved action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillResult {
    pub success: bool,
    /// Why a failed result failed ("unclear", "insufficient resource: ...").
    pub reason: Option<String>,

    // Roll breakdown
    pub roll: Option<i32>,
    pub total: Option<i32>,
    pub dc: Option<i32>,
    pub is_critical: bool,
    pub is_fumble: bool,

    // Effects
    pub damage: Option<i32>,
    pub healing: Option<i32>,
    pub conditions_applied: Vec<String>,

    // PbtA overlay
    pub pbta_outcome: Option<String>,
    pub gm_move_type: Option<String>,
    pub gm_move_description: Option<String>,
    pub strong_hit_bonus: Option<String>,
    pub weak_hit_complication: Option<String>,

    // World changes
    pub entities_created: Vec<EntityId>,
    pub state_changes: Vec<String>,

    /// Mechanical description for the narrative layer.
    pub description: String,
}

impl SkillResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            success: false,
            description: reason.clone(),
            reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn neutral(description: impl Into<String>) -> Self {
        Self {
            success: true,
            description: description.into(),
            ..Self::default()
        }
    }
}

/// Result returned to the shell for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub result: SkillResult,
    pub events_created: Vec<EventId>,
    /// Universe created, for fork turns.
    pub forked_universe: Option<UniverseId>,
}
