use crate::ids::{EntityId, UniverseId};

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur when constructing or mutating core records.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The requested entity does not exist in the given universe.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The requested universe does not exist.
    #[error("universe not found: {0}")]
    UniverseNotFound(UniverseId),

    /// An entity with the same name already exists in the universe.
    #[error("entity already exists: \"{0}\"")]
    DuplicateName(String),

    /// A field value is outside its documented range.
    #[error("validation error: {0}")]
    Validation(String),
}
