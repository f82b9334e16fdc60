//! Engine configuration

use crate::error::{HistoryError, HistoryResult};
use quiver_core::limits::MAX_UNDO_SIZE;
use quiver_core::{SchemaDefinition, DEFAULT_HISTORY_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default undo stack bound
pub const DEFAULT_MAX_UNDO_SIZE: usize = 100;

/// Name of the branch that exists from construction
pub const DEFAULT_BRANCH: &str = "main";

/// Configuration for an [`Engine`](crate::Engine)
///
/// Every key is optional in TOML:
///
/// ```toml
/// max_undo_size = 50
/// cascade_delete_relations = true
///
/// [schema.entity_types.Task]
/// required = ["title"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on both undo and redo stacks
    pub max_undo_size: usize,

    /// Envelopes kept by the event channel for replay (0 disables)
    pub event_history_capacity: usize,

    /// Load the baseline entity/relation types into the schema
    pub load_default_types: bool,

    /// Reject records whose type is not registered
    pub strict_types: bool,

    /// Remove relations touching an entity when the entity is removed
    pub cascade_delete_relations: bool,

    /// Name (and id) of the initial branch
    pub default_branch: String,

    /// Extra types registered on top of the defaults
    pub schema: SchemaDefinition,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_undo_size: DEFAULT_MAX_UNDO_SIZE,
            event_history_capacity: DEFAULT_HISTORY_CAPACITY,
            load_default_types: true,
            strict_types: false,
            cascade_delete_relations: false,
            default_branch: DEFAULT_BRANCH.to_string(),
            schema: SchemaDefinition::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> HistoryResult<Self> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading engine config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> HistoryResult<()> {
        if self.max_undo_size == 0 || self.max_undo_size > MAX_UNDO_SIZE {
            return Err(HistoryError::Config(format!(
                "max_undo_size must be between 1 and {}, got {}",
                MAX_UNDO_SIZE, self.max_undo_size
            )));
        }
        if self.default_branch.trim().is_empty() {
            return Err(HistoryError::Config(
                "default_branch cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
