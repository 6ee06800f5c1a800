//! Error types for the storage ports.

/// Errors from the truth and graph stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stale-version write was rejected.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A branch operation failed.
    #[error("branch error: {0}")]
    Branch(String),

    /// The backend itself failed; fatal to the current turn.
    #[error("repository error: {0}")]
    Repo(String),
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the LLM port. All of these are recoverable by falling back
/// to deterministic templates.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The call exceeded its deadline (5 seconds, enforced by the caller).
    #[error("llm call timed out")]
    Timeout,

    /// The response did not match the requested schema.
    #[error("llm response malformed: {0}")]
    Malformed(String),

    /// The response was empty.
    #[error("llm response empty")]
    Empty,

    /// No model is configured for this session.
    #[error("llm unavailable")]
    Unavailable,
}
