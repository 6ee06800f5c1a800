//! NPC personality profiles and memories.
//!
//! Profiles use the Big Five model scored 0-100 per trait; motivations are a
//! short priority list. Memories carry emotional valence and importance and
//! are retrieved by a recency-decayed relevance score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{EntityId, EventId};

/// Big Five personality traits, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub openness: u8,
    pub conscientiousness: u8,
    pub extraversion: u8,
    pub agreeableness: u8,
    pub neuroticism: u8,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            openness: 50,
            conscientiousness: 50,
            extraversion: 50,
            agreeableness: 50,
            neuroticism: 50,
        }
    }
}

impl PersonalityTraits {
    /// Risk tolerance in [0, 1]: openness raises it, neuroticism lowers it.
    pub fn risk_tolerance(&self) -> f64 {
        let base = 0.5 - (self.neuroticism as f64 - 50.0) / 200.0
            + (self.openness as f64 - 50.0) / 200.0;
        base.clamp(0.0, 1.0)
    }
}

/// What drives an NPC's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motivation {
    Survival,
    Safety,
    Wealth,
    Power,
    Comfort,
    Love,
    Belonging,
    Respect,
    Fame,
    Knowledge,
    Justice,
    Duty,
    Faith,
    Revenge,
    Artistry,
    Legacy,
}

/// Complete personality and motivation profile for one NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcProfile {
    pub entity_id: EntityId,
    pub traits: PersonalityTraits,
    /// Up to 3, ordered by priority.
    pub motivations: Vec<Motivation>,
    pub quirks: Vec<String>,
    /// Dialogue hint: "formal", "gruff", "poetic", ...
    pub speech_style: String,
}

impl NpcProfile {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            traits: PersonalityTraits::default(),
            motivations: vec![Motivation::Survival],
            quirks: Vec::new(),
            speech_style: "neutral".to_string(),
        }
    }

    pub fn primary_motivation(&self) -> Motivation {
        self.motivations.first().copied().unwrap_or(Motivation::Survival)
    }
}

/// Kinds of memories NPCs form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Encounter,
    Dialogue,
    Action,
    Observation,
    Rumor,
}

/// A single memory held by an NPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcMemory {
    pub id: Uuid,
    pub npc_id: EntityId,
    pub kind: MemoryKind,
    /// Entity this memory is about, if any.
    pub subject: Option<EntityId>,
    pub description: String,
    /// -1 (very negative) to +1 (very positive).
    pub valence: f64,
    /// 0 (trivial) to 1 (life-changing).
    pub importance: f64,
    pub event_id: Option<EventId>,
    pub formed_at: DateTime<Utc>,
}

impl NpcMemory {
    pub fn new(npc_id: EntityId, kind: MemoryKind, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            npc_id,
            kind,
            subject: None,
            description: description.into(),
            valence: 0.0,
            importance: 0.5,
            event_id: None,
            formed_at: Utc::now(),
        }
    }

    /// Retrieval score in [0, 1]: a weighted sum of recency (24h half-life),
    /// importance, emotional intensity, and caller-supplied relevance.
    pub fn retrieval_score(&self, relevance: f64, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.formed_at).num_seconds().max(0) as f64 / 3600.0;
        let recency = 1.0 / (1.0 + age_hours / 24.0);
        let intensity = self.valence.abs();
        let score =
            recency * 0.25 + self.importance * 0.25 + intensity * 0.25 + relevance.clamp(0.0, 1.0) * 0.25;
        score.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn risk_tolerance_bounds() {
        let mut traits = PersonalityTraits::default();
        assert!((traits.risk_tolerance() - 0.5).abs() < f64::EPSILON);

        traits.neuroticism = 100;
        traits.openness = 0;
        assert!(traits.risk_tolerance() < 0.1);

        traits.neuroticism = 0;
        traits.openness = 100;
        assert!(traits.risk_tolerance() > 0.9);
    }

    #[test]
    fn primary_motivation_defaults_to_survival() {
        let mut profile = NpcProfile::new(EntityId::new());
        profile.motivations.clear();
        assert_eq!(profile.primary_motivation(), Motivation::Survival);

        profile.motivations = vec![Motivation::Wealth, Motivation::Fame];
        assert_eq!(profile.primary_motivation(), Motivation::Wealth);
    }

    #[test]
    fn fresh_important_memories_score_higher() {
        let now = Utc::now();
        let mut fresh = NpcMemory::new(EntityId::new(), MemoryKind::Action, "saved my life");
        fresh.importance = 0.9;
        fresh.valence = 0.8;
        fresh.formed_at = now;

        let mut stale = NpcMemory::new(EntityId::new(), MemoryKind::Rumor, "heard about taxes");
        stale.importance = 0.1;
        stale.formed_at = now - Duration::days(7);

        assert!(fresh.retrieval_score(0.5, now) > stale.retrieval_score(0.5, now));
    }

    #[test]
    fn retrieval_score_stays_in_unit_interval() {
        let now = Utc::now();
        let mut memory = NpcMemory::new(EntityId::new(), MemoryKind::Encounter, "met a dragon");
        memory.importance = 1.0;
        memory.valence = -1.0;
        let score = memory.retrieval_score(1.0, now);
        assert!((0.0..=1.0).contains(&score));
    }
}
