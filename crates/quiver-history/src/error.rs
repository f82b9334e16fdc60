//! Error types for versioning and undo/redo

use thiserror::Error;

/// Result type alias for history operations
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// History-specific error types
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error(transparent)]
    Core(#[from] quiver_core::Error),

    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Branch already exists: {0}")]
    DuplicateBranch(String),

    #[error("Invalid branch name: {0:?}")]
    InvalidBranchName(String),

    #[error("No version has been created yet")]
    NoVersions,

    #[error("No batch is open")]
    NoOpenBatch,

    #[error("Cannot {0} while a batch is open")]
    BatchOpen(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    /// True for unknown entity/relation/version/branch ids
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Core(err) => err.is_not_found(),
            Self::VersionNotFound(_) | Self::BranchNotFound(_) => true,
            _ => false,
        }
    }
}
