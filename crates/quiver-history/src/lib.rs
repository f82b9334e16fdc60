//! Quiver History - versions, branches and undo/redo
//!
//! This crate layers an immutable version DAG and bounded undo/redo stacks
//! on top of a `quiver-core` graph. [`Engine`] owns all three and routes
//! every mutation event to both observers.

pub mod config;
pub mod engine;
pub mod error;
pub mod undo;
pub mod versioning;

pub use config::{EngineConfig, DEFAULT_BRANCH, DEFAULT_MAX_UNDO_SIZE};
pub use engine::Engine;
pub use error::{HistoryError, HistoryResult};
pub use undo::{Change, ChangeKind, Command, Item, Origin, UndoManager};
pub use versioning::{Branch, BranchId, SwitchRecord, Version, VersionId, Versioning};
