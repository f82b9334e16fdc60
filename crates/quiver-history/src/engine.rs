//! The single owner of a graph and its history
//!
//! [`Engine`] routes every caller mutation through the graph and hands the
//! resulting event to the dirty tracker and the undo recorder. Replayed
//! undo/redo events only reach the dirty tracker.

use crate::config::EngineConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::undo::{Origin, UndoManager};
use crate::versioning::{Branch, Version, Versioning};
use quiver_core::{
    Diff, Entity, Error, Event, EventBus, EventPattern, Fields, Graph, GraphEvent, NewEntity,
    NewRelation, Operation, Patch, Relation, Schema, Snapshot, SubscriptionId,
};

/// Graph, versioning and undo/redo behind one API
#[derive(Debug)]
pub struct Engine {
    graph: Graph,
    versioning: Versioning,
    history: UndoManager,
    cascade: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the default configuration
    pub fn new() -> Self {
        Self {
            graph: Graph::new().with_schema(Schema::with_defaults()),
            versioning: Versioning::default(),
            history: UndoManager::default(),
            cascade: false,
        }
    }

    pub fn from_config(config: EngineConfig) -> HistoryResult<Self> {
        config.validate()?;

        let mut schema = Schema::create(config.load_default_types).strict(config.strict_types);
        schema.register_all(config.schema)?;

        let graph = Graph::new()
            .with_schema(schema)
            .with_event_bus(EventBus::with_history_capacity(config.event_history_capacity));

        tracing::debug!(
            max_undo_size = config.max_undo_size,
            strict = config.strict_types,
            cascade = config.cascade_delete_relations,
            branch = %config.default_branch,
            "engine configured"
        );

        Ok(Self {
            graph,
            versioning: Versioning::new(&config.default_branch),
            history: UndoManager::new(config.max_undo_size),
            cascade: config.cascade_delete_relations,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn versioning(&self) -> &Versioning {
        &self.versioning
    }

    pub fn history(&self) -> &UndoManager {
        &self.history
    }

    pub fn schema_mut(&mut self) -> Option<&mut Schema> {
        self.graph.schema_mut()
    }

    pub fn events(&self) -> &EventBus {
        self.graph.events()
    }

    pub fn serialize(&self) -> Snapshot {
        self.graph.serialize()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, pattern: impl Into<EventPattern>, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.graph.subscribe(pattern, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.graph.events_mut().unsubscribe(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_entity(&mut self, new: NewEntity) -> HistoryResult<Entity> {
        self.apply_entity(Operation::AddEntity(new))
    }

    pub fn update_entity(&mut self, id: &str, patch: Patch) -> HistoryResult<Entity> {
        self.apply_entity(Operation::UpdateEntity {
            id: id.into(),
            patch,
        })
    }

    /// Remove an entity. With cascade enabled, relations touching it are
    /// removed first and the whole removal is one undo entry.
    pub fn remove_entity(&mut self, id: &str) -> HistoryResult<Entity> {
        if !self.cascade {
            return self.apply_entity(Operation::RemoveEntity(id.into()));
        }
        if !self.graph.contains_entity(id) {
            return Err(Error::EntityNotFound(id.to_string()).into());
        }

        let touching: Vec<String> = self
            .graph
            .relations_touching(id)
            .iter()
            .map(|r| r.id.0.clone())
            .collect();
        if touching.is_empty() {
            return self.apply_entity(Operation::RemoveEntity(id.into()));
        }

        tracing::debug!(entity = id, relations = touching.len(), "cascading removal");
        self.history.begin_batch(format!("remove {id}"));
        let result = self.remove_with_relations(id, &touching);
        self.history.end_batch()?;
        result
    }

    fn remove_with_relations(&mut self, id: &str, relations: &[String]) -> HistoryResult<Entity> {
        for relation_id in relations {
            self.remove_relation(relation_id)?;
        }
        self.apply_entity(Operation::RemoveEntity(id.into()))
    }

    pub fn add_relation(&mut self, new: NewRelation) -> HistoryResult<Relation> {
        self.apply_relation(Operation::AddRelation(new))
    }

    pub fn update_relation(&mut self, id: &str, patch: Patch) -> HistoryResult<Relation> {
        self.apply_relation(Operation::UpdateRelation {
            id: id.into(),
            patch,
        })
    }

    pub fn remove_relation(&mut self, id: &str) -> HistoryResult<Relation> {
        self.apply_relation(Operation::RemoveRelation(id.into()))
    }

    fn apply_entity(&mut self, operation: Operation) -> HistoryResult<Entity> {
        let event = self.apply(operation)?;
        let id = event.id().to_string();
        event
            .into_entity()
            .ok_or_else(|| Error::EntityNotFound(id).into())
    }

    fn apply_relation(&mut self, operation: Operation) -> HistoryResult<Relation> {
        let event = self.apply(operation)?;
        let id = event.id().to_string();
        event
            .into_relation()
            .ok_or_else(|| Error::RelationNotFound(id).into())
    }

    /// Run a raw operation. Cascade does not apply here.
    pub fn apply(&mut self, operation: Operation) -> HistoryResult<GraphEvent> {
        let event = self.graph.apply(operation)?;
        self.observe(&event);
        Ok(event)
    }

    fn observe(&mut self, event: &GraphEvent) {
        self.versioning.observe(event, self.graph.events_mut());
        self.history.record(event, Origin::User);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Versions and branches
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_version(&mut self, metadata: Fields) -> Version {
        self.versioning.create_version(&mut self.graph, metadata)
    }

    /// Restore a version. Undo/redo history is cleared since it describes
    /// the replaced state.
    pub fn switch_to_version(&mut self, version_id: &str) -> HistoryResult<()> {
        if self.history.batch_depth() > 0 {
            return Err(HistoryError::BatchOpen("switch versions"));
        }
        self.versioning
            .switch_to_version(&mut self.graph, version_id)?;
        self.history.clear(self.graph.events_mut());
        Ok(())
    }

    pub fn create_branch(&mut self, name: &str, from_version_id: Option<&str>) -> HistoryResult<Branch> {
        self.versioning
            .create_branch(name, from_version_id, self.graph.events_mut())
    }

    pub fn switch_branch(&mut self, branch_id: &str) -> HistoryResult<()> {
        self.versioning
            .switch_branch(branch_id, self.graph.events_mut())
    }

    pub fn diff_versions(&self, from: &str, to: &str) -> HistoryResult<Diff> {
        self.versioning.diff_versions(from, to)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Undo / redo
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns `false` when there was nothing to undo
    pub fn undo(&mut self) -> HistoryResult<bool> {
        let replayed = self.history.undo(&mut self.graph)?;
        Ok(self.observe_replay(replayed))
    }

    /// Returns `false` when there was nothing to redo
    pub fn redo(&mut self) -> HistoryResult<bool> {
        let replayed = self.history.redo(&mut self.graph)?;
        Ok(self.observe_replay(replayed))
    }

    fn observe_replay(&mut self, replayed: Option<Vec<GraphEvent>>) -> bool {
        let Some(events) = replayed else {
            return false;
        };
        for event in &events {
            self.versioning.observe(event, self.graph.events_mut());
            self.history.record(event, Origin::Replay);
        }
        true
    }

    pub fn begin_batch(&mut self, label: impl Into<String>) {
        self.history.begin_batch(label);
    }

    pub fn end_batch(&mut self) -> HistoryResult<bool> {
        self.history.end_batch()
    }

    pub fn set_max_undo_size(&mut self, max_size: usize) -> HistoryResult<()> {
        self.history.set_max_undo_size(max_size)
    }

    pub fn clear_history(&mut self) {
        self.history.clear(self.graph.events_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::Change;
    use serde_json::json;

    #[test]
    fn test_default_schema_gates_mutations() {
        let mut engine = Engine::new();
        let err = engine.add_entity(NewEntity::new("Person")).unwrap_err();
        assert!(matches!(err, HistoryError::Core(Error::Validation(_))));
        assert_eq!(engine.graph().entity_count(), 0);
        assert!(!engine.history().can_undo());
        assert!(!engine.versioning().is_dirty());
    }

    #[test]
    fn test_mutations_are_recorded() {
        let mut engine = Engine::new();
        let alice = engine
            .add_entity(NewEntity::new("Person").with_field("name", "Alice"))
            .unwrap();
        engine
            .update_entity(alice.id.as_str(), Patch::new().set("name", "Alicia"))
            .unwrap();

        assert_eq!(engine.history().undo_len(), 2);
        assert!(engine.versioning().is_dirty());

        assert!(engine.undo().unwrap());
        assert_eq!(
            engine.graph().get_entity(alice.id.as_str()).unwrap().field("name"),
            Some(&json!("Alice"))
        );
        assert_eq!(engine.history().undo_len(), 1);
        assert_eq!(engine.history().redo_len(), 1);
    }

    #[test]
    fn test_observers_see_published_event() {
        let mut engine = Engine::new();
        engine
            .add_entity(NewEntity::new("Person").with_id("e1").with_field("name", "Alice"))
            .unwrap();

        let published = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&published);
        engine.subscribe("graph.*", move |e: &Event| {
            if let Some(event) = e.as_graph() {
                sink.lock().unwrap().push(event.clone());
            }
        });

        let after = engine
            .update_entity("e1", Patch::new().set("name", "Alicia"))
            .unwrap();

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].entity(), Some(&after));
        let recorded = engine.history().undo_stack().last().unwrap();
        assert_eq!(recorded.changes, vec![Change::from_event(&published[0])]);
    }

    #[test]
    fn test_update_unknown_entity() {
        let mut engine = Engine::new();
        let err = engine
            .update_entity("ghost", Patch::new().set("name", "x"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_config_registers_types() {
        let config = EngineConfig::from_toml_str(
            r#"
            strict_types = true
            max_undo_size = 2

            [schema.entity_types.Task]
            required = ["title"]
            "#,
        )
        .unwrap();
        let mut engine = Engine::from_config(config).unwrap();

        engine
            .add_entity(NewEntity::new("Task").with_field("title", "write docs"))
            .unwrap();
        assert!(engine.add_entity(NewEntity::new("Robot")).is_err());

        for i in 0..3 {
            engine
                .add_entity(NewEntity::new("Task").with_field("title", format!("t{i}")))
                .unwrap();
        }
        assert_eq!(engine.history().undo_len(), 2);
    }

    #[test]
    fn test_switch_version_clears_history() {
        let mut engine = Engine::new();
        let v1 = engine.create_version(Fields::new());
        engine
            .add_entity(NewEntity::new("Concept").with_field("name", "graph"))
            .unwrap();
        assert!(engine.history().can_undo());

        engine.switch_to_version(v1.id().as_str()).unwrap();
        assert!(!engine.history().can_undo());
        assert_eq!(engine.graph().entity_count(), 0);

        engine.begin_batch("open");
        assert!(matches!(
            engine.switch_to_version(v1.id().as_str()),
            Err(HistoryError::BatchOpen(_))
        ));
    }
}
