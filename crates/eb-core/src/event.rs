use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{EntityId, EventId, UniverseId};

/// Types of events that can occur in the world. Events are the sole
/// mechanism by which state changes are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Combat
    CombatStart,
    CombatRound,
    CombatEnd,
    Attack,
    Damage,
    Heal,
    Death,

    // Social
    Dialogue,
    Persuasion,
    Intimidation,
    Deception,

    // Movement
    Travel,
    WorldTravel,

    // Items
    ItemPickup,
    ItemDrop,
    ItemTransfer,
    ItemUse,
    ItemLost,

    // Rest
    ShortRest,
    LongRest,

    // Checks
    SkillCheck,
    SavingThrow,

    // Effects and resources
    ConditionApplied,
    ConditionRemoved,
    ConcentrationBroken,
    ResourceUsed,
    BreakingPoint,

    // World
    Fork,
    GmMove,
    TimePassage,
    QuestUpdated,
    ReputationChanged,

    // Meta
    SessionStart,
    SessionEnd,
}

impl EventType {
    pub fn is_combat(self) -> bool {
        matches!(
            self,
            Self::CombatStart
                | Self::CombatRound
                | Self::CombatEnd
                | Self::Attack
                | Self::Damage
                | Self::Heal
                | Self::Death
        )
    }

    pub fn is_social(self) -> bool {
        matches!(
            self,
            Self::Dialogue | Self::Persuasion | Self::Intimidation | Self::Deception
        )
    }
}

/// Outcome label attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Hit,
    Miss,
    StrongHit,
    WeakHit,
    Success,
    Fail,
    #[default]
    Neutral,
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
            Self::StrongHit => write!(f, "strong_hit"),
            Self::WeakHit => write!(f, "weak_hit"),
            Self::Success => write!(f, "success"),
            Self::Fail => write!(f, "fail"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// An immutable record of something that happened. Events are append-only;
/// the log is the ground truth and current state is a function of it.
///
/// Payload shapes are binary-stable per event type: fields may be added but
/// never renamed or removed. Payloads carry absolute post-state values
/// (`hp_after`, destination ids) so a fresh state can be rebuilt by replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub universe_id: UniverseId,
    pub event_type: EventType,
    /// In-game time.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time when recorded.
    pub real_timestamp: DateTime<Utc>,
    pub actor_id: EntityId,
    pub target_id: Option<EntityId>,
    pub location_id: Option<EntityId>,
    pub outcome: EventOutcome,
    /// The natural d20 roll, if one was made.
    pub roll: Option<i32>,
    /// Event-specific data.
    pub payload: BTreeMap<String, Value>,
    /// Parent event in the causal chain. Must form a DAG per universe.
    pub caused_by: Option<EventId>,
}

impl Event {
    pub fn new(universe_id: UniverseId, event_type: EventType, actor_id: EntityId) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            universe_id,
            event_type,
            timestamp: now,
            real_timestamp: now,
            actor_id,
            target_id: None,
            location_id: None,
            outcome: EventOutcome::Neutral,
            roll: None,
            payload: BTreeMap::new(),
            caused_by: None,
        }
    }

    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target_id = Some(target);
        self
    }

    pub fn with_location(mut self, location: EntityId) -> Self {
        self.location_id = Some(location);
        self
    }

    pub fn with_outcome(mut self, outcome: EventOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_roll(mut self, roll: i32) -> Self {
        self.roll = Some(roll);
        self
    }

    pub fn with_cause(mut self, cause: EventId) -> Self {
        self.caused_by = Some(cause);
        self
    }

    /// Attach a payload field.
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Read an integer payload field.
    pub fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    /// Read a string payload field.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}
