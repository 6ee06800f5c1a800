//! Error types for the mechanics engine.

/// Errors that can occur during rules resolution.
#[derive(Debug, thiserror::Error)]
pub enum MechError {
    /// Dice notation could not be parsed or is out of range.
    #[error("bad dice notation: {0}")]
    BadNotation(String),

    /// A named skill does not exist in the skill table.
    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    /// A resource needed by an ability is exhausted.
    #[error("insufficient resource: {0}")]
    InsufficientResource(String),

    /// An ability's targeting does not match how it was invoked.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// An ability definition violates its schema.
    #[error("invalid ability: {0}")]
    InvalidAbility(String),

    /// A rule constraint was violated (e.g. a forbidden source).
    #[error("rule violation: {0}")]
    RuleViolation(String),
}

/// Convenience result type for mechanics operations.
pub type MechResult<T> = Result<T, MechError>;
