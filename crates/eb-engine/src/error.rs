//! The engine's closed error set.
//!
//! Policy: `BadInput`, `NotFound`, `InsufficientResource`, `InvalidTarget`,
//! and `RuleViolation` surface to the caller as a failed `SkillResult`
//! without mutating state. `Timeout` is recovered locally via template
//! fallbacks. `ConflictState` gets one retry with a reload. `RepoError` is
//! fatal to the turn and rolls the transaction back.

use eb_mechanics::error::MechError;
use eb_store::error::{LlmError, StoreError};

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Everything that can go wrong while resolving a turn.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed notation or an unknown intent.
    #[error("bad input: {0}")]
    BadInput(String),

    /// A referenced entity, ability, or universe is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Out of slots, momentum, uses, or usage die.
    #[error("insufficient resource: {0}")]
    InsufficientResource(String),

    /// Targeting does not fit the ability or situation.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// A rule constraint was violated.
    #[error("rule violation: {0}")]
    RuleViolation(String),

    /// A stale version or concurrent edit was detected.
    #[error("conflicting state: {0}")]
    ConflictState(String),

    /// An LLM call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The persistence layer failed; the turn is rolled back.
    #[error("repository error: {0}")]
    RepoError(String),
}

impl EngineError {
    /// Errors that surface as a failed result without mutating state.
    pub fn is_player_facing(&self) -> bool {
        matches!(
            self,
            Self::BadInput(_)
                | Self::NotFound(_)
                | Self::InsufficientResource(_)
                | Self::InvalidTarget(_)
                | Self::RuleViolation(_)
        )
    }

    /// A short machine-readable reason for `SkillResult.reason`.
    pub fn reason(&self) -> String {
        match self {
            Self::BadInput(m) => format!("bad input: {m}"),
            Self::NotFound(m) => format!("not found: {m}"),
            Self::InsufficientResource(m) => format!("insufficient resource: {m}"),
            Self::InvalidTarget(m) => format!("invalid target: {m}"),
            Self::RuleViolation(m) => format!("rule violation: {m}"),
            Self::ConflictState(m) => format!("conflict: {m}"),
            Self::Timeout(m) => format!("timeout: {m}"),
            Self::RepoError(m) => format!("repository error: {m}"),
        }
    }
}

impl From<MechError> for EngineError {
    fn from(err: MechError) -> Self {
        match err {
            MechError::BadNotation(m) | MechError::UnknownSkill(m) => Self::BadInput(m),
            MechError::InsufficientResource(m) => Self::InsufficientResource(m),
            MechError::InvalidTarget(m) => Self::InvalidTarget(m),
            MechError::InvalidAbility(m) | MechError::RuleViolation(m) => Self::RuleViolation(m),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(m) => Self::NotFound(m),
            StoreError::Conflict(m) => Self::ConflictState(m),
            StoreError::Branch(m) | StoreError::Repo(m) => Self::RepoError(m),
        }
    }
}

impl From<LlmError> for EngineError {
    fn from(err: LlmError) -> Self {
        Self::Timeout(err.to_string())
    }
}
