//! PbtA outcome overlay and GM-move selection.
//!
//! Every resolved roll is classified into strong hit / weak hit / miss. A
//! miss hands the turn to the GM, who makes one move from a closed set.
//! Move selection is a pure function of the situation so that identical
//! seeds and inputs replay identically.

use serde::{Deserialize, Serialize};

/// Three-tier outcome overlay on top of d20 resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PbtaOutcome {
    /// Beat the DC by 5 or more: success plus an extra benefit.
    StrongHit,
    /// Met the DC: success with a cost or complication.
    WeakHit,
    /// Failed: the GM makes a move.
    Miss,
}

/// Moves the GM can make on a player miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GmMoveType {
    // Soft moves (warnings)
    ShowDanger,
    OfferOpportunity,
    RevealUnwelcomeTruth,

    // Hard moves (consequences)
    DealDamage,
    UseMonsterMove,
    SeparateThem,
    TakeAway,
    Capture,

    // Always available
    AdvanceTime,
    IntroduceNpc,
    ChangeEnvironment,
}

/// Soft moves telegraph danger without immediate cost.
const SOFT_MOVES: [GmMoveType; 3] = [
    GmMoveType::ShowDanger,
    GmMoveType::OfferOpportunity,
    GmMoveType::RevealUnwelcomeTruth,
];

/// Hard moves land a direct consequence.
const HARD_MOVES: [GmMoveType; 5] = [
    GmMoveType::DealDamage,
    GmMoveType::UseMonsterMove,
    GmMoveType::TakeAway,
    GmMoveType::SeparateThem,
    GmMoveType::Capture,
];

/// Hard moves preferred while in combat.
const COMBAT_MOVES: [GmMoveType; 3] = [
    GmMoveType::DealDamage,
    GmMoveType::UseMonsterMove,
    GmMoveType::TakeAway,
];

impl GmMoveType {
    pub fn is_hard(self) -> bool {
        HARD_MOVES.contains(&self)
    }

    /// Generative moves create entities when executed.
    pub fn is_generative(self) -> bool {
        matches!(
            self,
            Self::IntroduceNpc | Self::ChangeEnvironment | Self::RevealUnwelcomeTruth
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ShowDanger => "show_danger",
            Self::OfferOpportunity => "offer_opportunity",
            Self::RevealUnwelcomeTruth => "reveal_unwelcome_truth",
            Self::DealDamage => "deal_damage",
            Self::UseMonsterMove => "use_monster_move",
            Self::SeparateThem => "separate_them",
            Self::TakeAway => "take_away",
            Self::Capture => "capture",
            Self::AdvanceTime => "advance_time",
            Self::IntroduceNpc => "introduce_npc",
            Self::ChangeEnvironment => "change_environment",
        }
    }
}

/// A GM move selected in response to a miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GmMove {
    pub move_type: GmMoveType,
    pub is_hard: bool,
    pub description: String,
    /// Damage dealt, for `DealDamage`.
    pub damage: Option<i32>,
}

/// Classify a roll into the PbtA bands.
///
/// With a DC: margin >= 5 is a strong hit, 0..=4 a weak hit, below 0 a miss.
/// Without one, absolute thresholds apply (15+/10+). A natural 20 is always
/// a strong hit, a natural 1 always a miss.
pub fn classify(total: i32, dc: Option<i32>, is_critical: bool, is_fumble: bool) -> PbtaOutcome {
    if is_critical {
        return PbtaOutcome::StrongHit;
    }
    if is_fumble {
        return PbtaOutcome::Miss;
    }
    match dc {
        Some(dc) => {
            let margin = total - dc;
            if margin >= 5 {
                PbtaOutcome::StrongHit
            } else if margin >= 0 {
                PbtaOutcome::WeakHit
            } else {
                PbtaOutcome::Miss
            }
        }
        None => {
            if total >= 15 {
                PbtaOutcome::StrongHit
            } else if total >= 10 {
                PbtaOutcome::WeakHit
            } else {
                PbtaOutcome::Miss
            }
        }
    }
}

/// Inputs to GM-move selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveContext {
    /// Location danger, 0-20.
    pub danger_level: u8,
    pub in_combat: bool,
    /// Soft moves already made recently; two warnings escalate to hard.
    pub recent_soft_moves: u32,
    /// Recent event count, used to vary the pick within a category.
    pub recent_events: u32,
}

/// Select a GM move for a miss. Deterministic: the same context always
/// yields the same move.
pub fn select_gm_move(context: MoveContext) -> GmMove {
    let escalate =
        context.danger_level >= 10 || context.recent_soft_moves >= 2 || context.in_combat;

    let pool: &[GmMoveType] = if escalate {
        if context.in_combat {
            &COMBAT_MOVES
        } else {
            &HARD_MOVES
        }
    } else {
        &SOFT_MOVES
    };

    let index = (context.danger_level as usize + context.recent_events as usize) % pool.len();
    let move_type = pool[index];

    GmMove {
        move_type,
        is_hard: move_type.is_hard(),
        description: move_description(move_type).to_string(),
        damage: (move_type == GmMoveType::DealDamage).then(|| move_damage(context.danger_level)),
    }
}

/// Damage for a `DealDamage` move scales with location danger.
fn move_damage(danger_level: u8) -> i32 {
    match danger_level {
        0..=5 => 2,
        6..=10 => 3,
        11..=15 => 4,
        _ => 5,
    }
}

fn move_description(move_type: GmMoveType) -> &'static str {
    match move_type {
        GmMoveType::ShowDanger => "Something dangerous reveals itself...",
        GmMoveType::OfferOpportunity => "An opportunity presents itself, but at a cost...",
        GmMoveType::RevealUnwelcomeTruth => "You realize something troubling...",
        GmMoveType::DealDamage => "The enemy strikes back!",
        GmMoveType::UseMonsterMove => "The creature uses its special ability!",
        GmMoveType::SeparateThem => "You're driven apart from your allies!",
        GmMoveType::TakeAway => "Something important is lost or broken!",
        GmMoveType::Capture => "You find yourself trapped!",
        GmMoveType::AdvanceTime => "Time passes, and the situation changes...",
        GmMoveType::IntroduceNpc => "Someone new arrives on the scene...",
        GmMoveType::ChangeEnvironment => "The environment shifts around you...",
    }
}

/// The extra benefit a strong hit grants, by intent kind.
pub fn strong_hit_bonus(intent: &str) -> &'static str {
    match intent {
        "attack" => "You find an opening for a follow-up attack.",
        "persuade" => "They're genuinely convinced and may help further.",
        "intimidate" => "They're completely cowed and won't oppose you.",
        "deceive" => "They believe you completely and share useful information.",
        "search" => "You find exactly what you're looking for, and something else useful.",
        "move" => "You move swiftly and gain a tactical advantage.",
        "rest" => "You feel especially refreshed and ready for action.",
        _ => "You succeed with style.",
    }
}

/// The cost a weak hit carries, by intent kind.
pub fn weak_hit_complication(intent: &str) -> &'static str {
    match intent {
        "attack" => "You hit, but leave yourself exposed.",
        "persuade" => "They agree, but want something in return.",
        "intimidate" => "They comply, but will resent you for it.",
        "deceive" => "They believe you, but remain suspicious.",
        "search" => "You find something, but it takes longer than expected.",
        "move" => "You get there, but the journey was harder than expected.",
        "rest" => "You rest, but something interrupts your peace.",
        _ => "You succeed, but barely.",
    }
}
