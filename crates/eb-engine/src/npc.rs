//! Personality-driven NPC action selection.
//!
//! Given a profile, a situation, and a candidate action set, each action is
//! scored as a weighted sum of motivation fit, relationship pressure,
//! personality consistency, and risk. The highest score wins; ties break
//! toward the lowest action id so decisions replay identically.

use serde::{Deserialize, Serialize};

use eb_core::ids::EntityId;
use eb_core::npc::{Motivation, NpcProfile};
use eb_core::relationship::RelationshipKind;

/// The candidate action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcAction {
    Attack,
    Flee,
    Negotiate,
    Assist,
    Observe,
    UseAbility,
    Leave,
}

impl NpcAction {
    pub const ALL: [NpcAction; 7] = [
        Self::Attack,
        Self::Flee,
        Self::Negotiate,
        Self::Assist,
        Self::Observe,
        Self::UseAbility,
        Self::Leave,
    ];

    /// Stable ordinal used for tie-breaking.
    pub fn id(self) -> u8 {
        match self {
            Self::Attack => 0,
            Self::Flee => 1,
            Self::Negotiate => 2,
            Self::Assist => 3,
            Self::Observe => 4,
            Self::UseAbility => 5,
            Self::Leave => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Flee => "flee",
            Self::Negotiate => "negotiate",
            Self::Assist => "assist",
            Self::Observe => "observe",
            Self::UseAbility => "use_ability",
            Self::Leave => "leave",
        }
    }
}

/// How the NPC relates to the entity it is reacting to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StanceToward {
    pub kind: RelationshipKind,
    pub trust: Option<f64>,
}

/// The situation the NPC is deciding in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionContext {
    /// Location danger, 0-20.
    pub danger_level: u8,
    /// The NPC's HP as a fraction of max.
    pub hp_fraction: f64,
    /// Hostile entities visible.
    pub threats_present: u32,
    /// The subject of the decision (usually the player).
    pub subject: Option<EntityId>,
    /// Relationships the NPC has with the subject.
    pub stances: Vec<StanceToward>,
    /// True when the NPC has a usable ability worth spending.
    pub has_usable_ability: bool,
    /// Exits available; with none, fleeing is off the table.
    pub escape_routes: u32,
}

/// A scored decision with the full score table for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: NpcAction,
    pub target: Option<EntityId>,
    /// Per-action scores, sorted by action id.
    pub scores: Vec<(NpcAction, f64)>,
}

/// Which actions each motivation leans toward.
fn motivation_weight(motivation: Motivation, action: NpcAction) -> f64 {
    use Motivation::*;
    use NpcAction::*;
    match (motivation, action) {
        (Survival | Safety, Flee) => 1.0,
        (Survival | Safety, Observe) => 0.6,
        (Survival | Safety, Leave) => 0.5,
        (Wealth, Negotiate) => 1.0,
        (Wealth, Observe) => 0.4,
        (Power | Revenge, Attack) => 1.0,
        (Power | Revenge, UseAbility) => 0.7,
        (Love | Belonging | Duty | Faith, Assist) => 1.0,
        (Love | Belonging, Negotiate) => 0.5,
        (Respect | Fame, Negotiate) => 0.7,
        (Fame, Attack) => 0.5,
        (Knowledge | Artistry, Observe) => 1.0,
        (Knowledge, Negotiate) => 0.5,
        (Justice, Attack) => 0.7,
        (Justice | Legacy, Assist) => 0.6,
        (Comfort, Leave) => 0.8,
        (Comfort, Observe) => 0.4,
        _ => 0.0,
    }
}

fn motivation_score(profile: &NpcProfile, action: NpcAction) -> f64 {
    let mut score = 0.0;
    for (index, motivation) in profile.motivations.iter().enumerate() {
        // Primary motivation weighs most.
        let priority = 1.0 - index as f64 * 0.25;
        score += motivation_weight(*motivation, action) * priority;
    }
    score.min(1.0)
}

fn relationship_score(context: &DecisionContext, action: NpcAction) -> f64 {
    if context.stances.is_empty() {
        return 0.5;
    }
    let mut score: f64 = 0.5;
    for stance in &context.stances {
        match stance.kind {
            RelationshipKind::Knows => {
                let trust = stance.trust.unwrap_or(0.0);
                match action {
                    NpcAction::Assist | NpcAction::Negotiate => score += trust * 0.4,
                    NpcAction::Attack => score -= trust * 0.4,
                    _ => {}
                }
            }
            RelationshipKind::Fears => match action {
                NpcAction::Flee | NpcAction::Leave => score += 0.4,
                NpcAction::Attack | NpcAction::Negotiate => score -= 0.3,
                _ => {}
            },
            RelationshipKind::Desires => match action {
                NpcAction::Negotiate | NpcAction::Assist => score += 0.3,
                _ => {}
            },
            _ => {}
        }
    }
    score.clamp(0.0, 1.0)
}

fn personality_score(profile: &NpcProfile, action: NpcAction) -> f64 {
    let traits = &profile.traits;
    let mut score: f64 = 0.5;
    let lean = |value: u8| (value as f64 - 50.0) / 200.0;

    match action {
        NpcAction::Negotiate => score += lean(traits.extraversion) + lean(traits.agreeableness),
        NpcAction::Assist => score += lean(traits.agreeableness),
        NpcAction::Attack => score -= lean(traits.agreeableness),
        NpcAction::Observe => score += lean(traits.conscientiousness) - lean(traits.extraversion),
        NpcAction::Flee | NpcAction::Leave => score += lean(traits.neuroticism),
        NpcAction::UseAbility => score += lean(traits.openness),
    }
    score.clamp(0.0, 1.0)
}

fn risk_score(context: &DecisionContext, action: NpcAction) -> f64 {
    let mut risk: f64 = match action {
        NpcAction::Attack => 0.5,
        NpcAction::UseAbility => 0.4,
        NpcAction::Negotiate => 0.2,
        NpcAction::Assist => 0.2,
        NpcAction::Observe => 0.1,
        NpcAction::Flee | NpcAction::Leave => 0.1,
    };
    if context.hp_fraction < 0.5 && action == NpcAction::Attack {
        risk += 0.3;
    }
    risk += context.danger_level as f64 / 40.0;
    if context.threats_present > 1 {
        risk += 0.1 * context.threats_present as f64;
    }
    risk.clamp(0.0, 1.0)
}

/// Pick an action for the NPC.
///
/// Danger modulates the mix: high neuroticism amplifies fight-or-flight as
/// danger rises. The output carries every action's score so tests (and
/// curious GMs) can audit the choice.
pub fn decide_action(
    profile: &NpcProfile,
    context: &DecisionContext,
    candidates: &[NpcAction],
) -> Decision {
    let risk_tolerance = profile.traits.risk_tolerance();
    let mut scores: Vec<(NpcAction, f64)> = candidates
        .iter()
        .map(|&action| {
            let motivation = motivation_score(profile, action);
            let relationship = relationship_score(context, action);
            let personality = personality_score(profile, action);
            let risk = risk_score(context, action);

            let mut total = motivation * 0.35 + relationship * 0.25 + personality * 0.25
                - risk * (1.0 - risk_tolerance) * 0.3;

            // Fight-or-flight: danger pushes anxious NPCs toward extremes.
            if context.danger_level >= 10
                && profile.traits.neuroticism > 70
                && matches!(action, NpcAction::Flee | NpcAction::Attack)
            {
                total += 0.15;
            }

            if action == NpcAction::UseAbility && !context.has_usable_ability {
                total = f64::MIN;
            }
            if context.escape_routes == 0 && matches!(action, NpcAction::Flee | NpcAction::Leave) {
                total = f64::MIN;
            }

            (action, total)
        })
        .collect();

    scores.sort_by_key(|(action, _)| action.id());
    let best = scores
        .iter()
        .copied()
        .max_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Ties break toward the lowest action id.
                .then(b.0.id().cmp(&a.0.id()))
        })
        .map(|(action, _)| action)
        .unwrap_or(NpcAction::Observe);

    Decision {
        action: best,
        target: context.subject,
        scores,
    }
}
