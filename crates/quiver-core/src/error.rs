//! Error types for Quiver Core

use crate::limits::LimitError;
use thiserror::Error;

/// Result type alias using Quiver's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Quiver core error types
#[derive(Error, Debug)]
pub enum Error {
    /// The schema rejected the data; carries the schema's detailed message.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Type already registered: {0}")]
    DuplicateType(String),

    /// A type registration call was malformed (bad pattern, empty name, ...).
    #[error("Invalid schema definition: {0}")]
    InvalidSchema(String),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error(transparent)]
    Limit(#[from] LimitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound(_) | Self::RelationNotFound(_))
    }
}
