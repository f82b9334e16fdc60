//! End-to-end scenarios through the engine

use quiver_core::{DiffEngine, EntityTypeDef, Event, Fields, NewEntity, NewRelation, Patch};
use quiver_history::{Engine, EngineConfig, HistoryError};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn record_names(engine: &mut Engine, pattern: &str) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.subscribe(pattern, move |event: &Event| {
        sink.lock().unwrap().push(event.name().to_string());
    });
    seen
}

fn person(id: &str, name: &str) -> NewEntity {
    NewEntity::new("Person").with_id(id).with_field("name", name)
}

#[test]
fn version_round_trip() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "Alice")).unwrap();
    engine.add_entity(person("e2", "Bob")).unwrap();
    engine
        .add_relation(NewRelation::new("e1", "e2", "related_to").with_id("r1"))
        .unwrap();
    let v1 = engine.create_version(Fields::new());

    engine.remove_relation("r1").unwrap();
    engine
        .update_entity("e1", Patch::new().set("name", "Alicia"))
        .unwrap();
    engine.add_entity(person("e3", "Carol")).unwrap();
    engine.create_version(Fields::new());

    engine.switch_to_version(v1.id().as_str()).unwrap();
    assert_eq!(engine.serialize(), *v1.snapshot());
    assert!(!engine.versioning().is_dirty());
}

#[test]
fn alice_to_bob_diff() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "Alice")).unwrap();
    let v1 = engine.create_version(Fields::new());
    engine
        .update_entity("e1", Patch::new().set("name", "Bob"))
        .unwrap();
    let v2 = engine.create_version(Fields::new());

    let diff = engine
        .diff_versions(v1.id().as_str(), v2.id().as_str())
        .unwrap();
    assert_eq!(diff.summary.total_modified, 1);
    assert_eq!(diff.summary.total_added, 0);
    assert_eq!(diff.summary.total_removed, 0);

    let update = &diff.entities.updated[0];
    assert_eq!(update.id, "e1");
    assert_eq!(update.changed_fields, vec!["name"]);
    assert_eq!(update.before.field("name"), Some(&json!("Alice")));
    assert_eq!(update.after.field("name"), Some(&json!("Bob")));

    let back = engine
        .diff_versions(v2.id().as_str(), v1.id().as_str())
        .unwrap();
    assert_eq!(DiffEngine::reverse(&diff), back);
}

#[test]
fn rename_two_batch_undo() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "A")).unwrap();
    engine.add_entity(person("e2", "B")).unwrap();

    engine.begin_batch("rename-two");
    engine
        .update_entity("e1", Patch::new().set("name", "X"))
        .unwrap();
    engine
        .update_entity("e2", Patch::new().set("name", "Y"))
        .unwrap();
    assert!(engine.end_batch().unwrap());

    assert!(engine.undo().unwrap());
    let graph = engine.graph();
    assert_eq!(graph.get_entity("e1").unwrap().field("name"), Some(&json!("A")));
    assert_eq!(graph.get_entity("e2").unwrap().field("name"), Some(&json!("B")));

    assert!(engine.redo().unwrap());
    let graph = engine.graph();
    assert_eq!(graph.get_entity("e1").unwrap().field("name"), Some(&json!("X")));
    assert_eq!(graph.get_entity("e2").unwrap().field("name"), Some(&json!("Y")));
}

#[test]
fn undo_marks_graph_dirty() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "A")).unwrap();
    engine.create_version(Fields::new());
    let seen = record_names(&mut engine, "version.*");

    assert!(engine.undo().unwrap());
    assert!(engine.versioning().is_dirty());
    assert_eq!(*seen.lock().unwrap(), vec!["version.dirty"]);
    assert_eq!(engine.history().redo_len(), 1);
    assert_eq!(engine.history().undo_len(), 0);
}

#[test]
fn event_ordering() {
    let mut engine = Engine::new();
    let seen = record_names(&mut engine, "*");

    engine.add_entity(person("e1", "A")).unwrap();
    engine.add_entity(person("e2", "B")).unwrap();
    let v1 = engine.create_version(Fields::new());
    engine
        .update_entity("e1", Patch::new().set("name", "Z"))
        .unwrap();
    engine.undo().unwrap();
    engine.redo().unwrap();
    engine.switch_to_version(v1.id().as_str()).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "graph.entity.added",
            "version.dirty",
            "graph.entity.added",
            "version.created",
            "graph.entity.updated",
            "version.dirty",
            "graph.entity.updated",
            "history.undo",
            "graph.entity.updated",
            "history.redo",
            "graph.loaded",
            "version.switched",
            "history.cleared",
        ]
    );
}

#[test]
fn relation_update_and_removal_round_trip() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "A")).unwrap();
    engine.add_entity(person("e2", "B")).unwrap();
    engine
        .add_relation(NewRelation::new("e1", "e2", "related_to").with_id("r1"))
        .unwrap();
    let created = engine.serialize();

    let updated = engine
        .update_relation("r1", Patch::new().set("strength", 3))
        .unwrap();
    assert_eq!(updated.field("strength"), Some(&json!(3)));
    let after_update = engine.serialize();

    engine.remove_relation("r1").unwrap();
    assert!(!engine.graph().contains_relation("r1"));

    assert!(engine.undo().unwrap());
    assert!(engine.serialize().same_content(&after_update));
    assert!(engine.undo().unwrap());
    assert!(engine.serialize().same_content(&created));
    assert_eq!(engine.graph().get_relation("r1").unwrap().field("strength"), None);

    assert!(engine.redo().unwrap());
    assert!(engine.serialize().same_content(&after_update));
    assert!(engine.redo().unwrap());
    assert!(!engine.graph().contains_relation("r1"));
}

#[test]
fn failed_undo_emits_nothing_and_stays_clean() {
    let mut engine = Engine::new();
    engine
        .add_entity(NewEntity::new("Concept").with_id("e1").with_field("name", "A"))
        .unwrap();
    engine.add_entity(person("e2", "B")).unwrap();

    engine.begin_batch("rename-two");
    engine
        .update_entity("e1", Patch::new().set("name", "X"))
        .unwrap();
    engine
        .update_entity("e2", Patch::new().set("name", "Y"))
        .unwrap();
    engine.end_batch().unwrap();
    engine.create_version(Fields::new());

    let schema = engine.schema_mut().unwrap();
    schema.clear();
    schema
        .register_entity_type("Concept", EntityTypeDef::new().require("summary"))
        .unwrap();

    let seen = record_names(&mut engine, "*");
    let before = engine.serialize();

    assert!(engine.undo().is_err());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(engine.serialize(), before);
    assert!(!engine.versioning().is_dirty());
    assert!(engine.history().can_undo());
}

#[test]
fn rejected_mutation_emits_nothing() {
    let mut engine = Engine::new();
    let seen = record_names(&mut engine, "*");

    let err = engine
        .add_entity(NewEntity::new("Person").with_id("e1"))
        .unwrap_err();
    assert!(matches!(err, HistoryError::Core(_)));
    assert!(err.to_string().contains("name"));
    assert!(seen.lock().unwrap().is_empty());
    assert!(!engine.history().can_undo());
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut engine = Engine::new();
    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    let id = engine.subscribe("graph.*", move |_: &Event| *sink.lock().unwrap() += 1);

    engine.add_entity(person("e1", "A")).unwrap();
    assert!(engine.unsubscribe(id));
    engine.add_entity(person("e2", "B")).unwrap();

    assert_eq!(*seen.lock().unwrap(), 1);
}

#[test]
fn cascade_removal_is_one_undo_entry() {
    let config = EngineConfig {
        cascade_delete_relations: true,
        ..EngineConfig::default()
    };
    let mut engine = Engine::from_config(config).unwrap();
    engine.add_entity(person("e1", "A")).unwrap();
    engine.add_entity(person("e2", "B")).unwrap();
    engine.add_entity(person("e3", "C")).unwrap();
    engine
        .add_relation(NewRelation::new("e1", "e2", "related_to").with_id("r1"))
        .unwrap();
    engine
        .add_relation(NewRelation::new("e3", "e1", "related_to").with_id("r2"))
        .unwrap();
    let before = engine.serialize();
    let entries = engine.history().undo_len();

    engine.remove_entity("e1").unwrap();
    assert_eq!(engine.graph().relation_count(), 0);
    assert_eq!(engine.history().undo_len(), entries + 1);
    assert_eq!(engine.history().undo_label(), Some("remove e1"));

    engine.undo().unwrap();
    assert!(engine.serialize().same_content(&before));
}

#[test]
fn dangling_relations_are_kept_without_cascade() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "A")).unwrap();
    engine.add_entity(person("e2", "B")).unwrap();
    engine
        .add_relation(NewRelation::new("e1", "e2", "related_to").with_id("r1"))
        .unwrap();

    engine.remove_entity("e1").unwrap();
    assert!(engine.graph().contains_relation("r1"));
}

#[test]
fn branching_keeps_main_head() {
    let mut engine = Engine::new();
    engine.add_entity(person("e1", "A")).unwrap();
    let v1 = engine.create_version(Fields::new());

    let feature = engine.create_branch("feature", None).unwrap();
    engine.switch_branch(feature.id.as_str()).unwrap();
    engine.add_entity(person("e2", "B")).unwrap();
    let v2 = engine.create_version(Fields::new());

    let main = engine.versioning().branch_by_name("main").unwrap();
    assert_eq!(main.head.as_ref(), Some(v1.id()));
    assert_eq!(v2.branch_id(), &feature.id);
    assert_eq!(engine.versioning().history().len(), 2);

    assert!(matches!(
        engine.create_branch("feature", None),
        Err(HistoryError::DuplicateBranch(_))
    ));
}
