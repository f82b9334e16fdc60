//! Quiver Core - versioned graph store primitives
//!
//! This crate provides the entity/relation store, the schema validation
//! gate, the synchronous event channel and the structural diff engine.
//! Versioning and undo/redo live in `quiver-history`.

pub mod diff;
pub mod entity;
pub mod error;
pub mod event;
pub mod graph;
pub mod limits;
pub mod relation;
pub mod schema;
pub mod snapshot;

pub use diff::{AnnotationChanges, ChangeSet, Diff, DiffEngine, DiffSummary, Update};
pub use entity::{Entity, EntityId, EntityType, Fields, NewEntity, Patch};
pub use error::{Error, Result};
pub use event::{
    Envelope, Event, EventBus, EventPattern, GraphEvent, SubscriptionId, DEFAULT_HISTORY_CAPACITY,
};
pub use graph::{Graph, Operation};
pub use limits::LimitError;
pub use relation::{Direction, NewRelation, Relation, RelationId};
pub use schema::{
    EntityTypeDef, FieldConstraint, FieldType, PropertyDef, RecordKind, RelationTypeDef, Schema,
    SchemaDefinition,
};
pub use snapshot::{Record, Snapshot};
