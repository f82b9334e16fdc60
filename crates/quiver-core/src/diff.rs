//! Structural comparison of snapshots
//!
//! [`DiffEngine`] works on plain [`Snapshot`]s and has no runtime link to a
//! live graph. Records are matched by id and compared key-by-key over their
//! serialized form, so a change nested anywhere inside a field (or inside
//! `metadata`) marks that top-level key as changed.
//!
//! Updates are ordered by id, which makes `reverse(diff(a, b)) == diff(b, a)`
//! hold even when the two snapshots list records in different orders.

use crate::entity::Entity;
use crate::error::Result;
use crate::relation::Relation;
use crate::snapshot::{Record, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// One record present on both sides with different content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update<T> {
    pub id: String,
    pub before: T,
    pub after: T,
    /// Top-level serialized keys whose values differ, sorted
    pub changed_fields: Vec<String>,
}

impl<T> Update<T> {
    fn reversed(self) -> Self {
        Self {
            id: self.id,
            before: self.after,
            after: self.before,
            changed_fields: self.changed_fields,
        }
    }
}

/// Added, updated and removed records of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet<T> {
    pub added: Vec<T>,
    pub updated: Vec<Update<T>>,
    pub removed: Vec<T>,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> ChangeSet<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    fn reversed(self) -> Self {
        Self {
            added: self.removed,
            updated: self.updated.into_iter().map(Update::reversed).collect(),
            removed: self.added,
        }
    }
}

/// Annotation bookkeeping carried alongside a diff. Always empty from
/// [`DiffEngine::diff`]; filled in by annotation-aware layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationChanges {
    #[serde(default)]
    pub preserved: Vec<Value>,
    #[serde(default)]
    pub archived: Vec<Value>,
}

/// Combined counts over entities and relations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total_added: usize,
    pub total_removed: usize,
    pub total_modified: usize,
}

impl DiffSummary {
    fn of(entities: &ChangeSet<Entity>, relations: &ChangeSet<Relation>) -> Self {
        Self {
            total_added: entities.added.len() + relations.added.len(),
            total_removed: entities.removed.len() + relations.removed.len(),
            total_modified: entities.updated.len() + relations.updated.len(),
        }
    }
}

/// Structured comparison of two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub entities: ChangeSet<Entity>,
    pub relations: ChangeSet<Relation>,
    #[serde(default)]
    pub annotations: AnnotationChanges,
    pub summary: DiffSummary,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.summary.total_added + self.summary.total_removed + self.summary.total_modified
    }
}

/// Diff, reverse, apply and merge over snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// Compare two snapshots. Duplicate ids on either side fail fast.
    pub fn diff(old: &Snapshot, new: &Snapshot) -> Result<Diff> {
        old.check_unique_ids()?;
        new.check_unique_ids()?;

        let entities = diff_records(&old.entities, &new.entities)?;
        let relations = diff_records(&old.relations, &new.relations)?;
        let summary = DiffSummary::of(&entities, &relations);
        tracing::debug!(
            added = summary.total_added,
            removed = summary.total_removed,
            modified = summary.total_modified,
            "computed diff"
        );

        Ok(Diff {
            entities,
            relations,
            annotations: AnnotationChanges::default(),
            summary,
        })
    }

    /// Compare two snapshots given as raw JSON
    pub fn diff_json(old: &Value, new: &Value) -> Result<Diff> {
        let old = Snapshot::from_value(old.clone())?;
        let new = Snapshot::from_value(new.clone())?;
        Self::diff(&old, &new)
    }

    /// Invert a diff: added and removed swap, every update swaps before/after
    pub fn reverse(diff: &Diff) -> Diff {
        let diff = diff.clone();
        Diff {
            entities: diff.entities.reversed(),
            relations: diff.relations.reversed(),
            annotations: diff.annotations,
            summary: DiffSummary {
                total_added: diff.summary.total_removed,
                total_removed: diff.summary.total_added,
                total_modified: diff.summary.total_modified,
            },
        }
    }

    /// Produce a new snapshot: drop removed ids, overwrite updated ids with
    /// their `after` state, then append added records.
    pub fn apply(base: &Snapshot, diff: &Diff) -> Snapshot {
        Snapshot {
            entities: apply_records(&base.entities, &diff.entities),
            relations: apply_records(&base.relations, &diff.relations),
        }
    }

    /// Union of two diffs keyed by id; `later` wins on collisions in
    /// `added` and `updated`. Performs no conflict detection.
    pub fn merge(earlier: &Diff, later: &Diff) -> Diff {
        let entities = merge_records(&earlier.entities, &later.entities);
        let relations = merge_records(&earlier.relations, &later.relations);
        let summary = DiffSummary::of(&entities, &relations);

        let mut annotations = earlier.annotations.clone();
        annotations
            .preserved
            .extend(later.annotations.preserved.iter().cloned());
        annotations
            .archived
            .extend(later.annotations.archived.iter().cloned());

        Diff {
            entities,
            relations,
            annotations,
            summary,
        }
    }
}

fn changed_fields<T: Record>(before: &T, after: &T) -> Result<Vec<String>> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;
    let empty = serde_json::Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    Ok(keys
        .into_iter()
        .filter(|key| before.get(key.as_str()) != after.get(key.as_str()))
        .cloned()
        .collect())
}

fn diff_records<T: Record>(old: &[T], new: &[T]) -> Result<ChangeSet<T>> {
    let old_index: HashMap<&str, &T> = old.iter().map(|r| (r.record_id(), r)).collect();
    let new_ids: HashSet<&str> = new.iter().map(Record::record_id).collect();

    let mut changes = ChangeSet::default();
    for record in new {
        match old_index.get(record.record_id()) {
            None => changes.added.push(record.clone()),
            Some(&previous) if previous != record => {
                let fields = changed_fields(previous, record)?;
                if !fields.is_empty() {
                    changes.updated.push(Update {
                        id: record.record_id().to_string(),
                        before: previous.clone(),
                        after: record.clone(),
                        changed_fields: fields,
                    });
                }
            }
            Some(_) => {}
        }
    }
    changes.removed = old
        .iter()
        .filter(|r| !new_ids.contains(r.record_id()))
        .cloned()
        .collect();
    changes.updated.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(changes)
}

/// Insert or overwrite `record` in `items`, keeping `index` in sync
fn upsert<T: Record>(items: &mut Vec<T>, index: &mut HashMap<String, usize>, record: &T) {
    match index.get(record.record_id()) {
        Some(&i) => items[i] = record.clone(),
        None => {
            index.insert(record.record_id().to_string(), items.len());
            items.push(record.clone());
        }
    }
}

fn apply_records<T: Record>(base: &[T], changes: &ChangeSet<T>) -> Vec<T> {
    let removed: HashSet<&str> = changes.removed.iter().map(Record::record_id).collect();
    let mut items: Vec<T> = base
        .iter()
        .filter(|r| !removed.contains(r.record_id()))
        .cloned()
        .collect();
    let mut index: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .map(|(i, r)| (r.record_id().to_string(), i))
        .collect();

    for update in &changes.updated {
        upsert(&mut items, &mut index, &update.after);
    }
    for record in &changes.added {
        upsert(&mut items, &mut index, record);
    }
    items
}

fn merge_records<T: Record>(earlier: &ChangeSet<T>, later: &ChangeSet<T>) -> ChangeSet<T> {
    let mut added = Vec::new();
    let mut added_index = HashMap::new();
    for record in earlier.added.iter().chain(&later.added) {
        upsert(&mut added, &mut added_index, record);
    }

    let mut updated: Vec<Update<T>> = Vec::new();
    let mut updated_index: HashMap<String, usize> = HashMap::new();
    for update in earlier.updated.iter().chain(&later.updated) {
        match updated_index.get(&update.id) {
            Some(&i) => updated[i] = update.clone(),
            None => {
                updated_index.insert(update.id.clone(), updated.len());
                updated.push(update.clone());
            }
        }
    }

    let mut seen = HashSet::new();
    let removed = earlier
        .removed
        .iter()
        .chain(&later.removed)
        .filter(|r| seen.insert(r.record_id().to_string()))
        .cloned()
        .collect();

    ChangeSet {
        added,
        updated,
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn person(id: &str, name: &str) -> Entity {
        Entity::new(id, "Person").with_field("name", name)
    }

    #[test]
    fn test_rename_reports_single_update() {
        let old = Snapshot::new().with_entities(vec![person("e1", "Alice")]);
        let new = Snapshot::new().with_entities(vec![person("e1", "Bob")]);

        let diff = DiffEngine::diff(&old, &new).unwrap();

        assert_eq!(diff.entities.updated.len(), 1);
        let update = &diff.entities.updated[0];
        assert_eq!(update.id, "e1");
        assert_eq!(update.before.field("name"), Some(&json!("Alice")));
        assert_eq!(update.after.field("name"), Some(&json!("Bob")));
        assert_eq!(update.changed_fields, vec!["name"]);
        assert_eq!(
            diff.summary,
            DiffSummary {
                total_added: 0,
                total_removed: 0,
                total_modified: 1
            }
        );
    }

    #[test]
    fn test_added_removed_and_nested_metadata() {
        let old = Snapshot::new()
            .with_entities(vec![
                person("keep", "K").with_metadata("tags", json!({"a": [1, 2]})),
                person("gone", "G"),
            ])
            .with_relations(vec![Relation::new("r1", "keep", "gone", "knows")]);
        let new = Snapshot::new()
            .with_entities(vec![
                person("keep", "K").with_metadata("tags", json!({"a": [1, 3]})),
                person("new", "N"),
            ])
            .with_relations(vec![]);

        let diff = DiffEngine::diff(&old, &new).unwrap();

        assert_eq!(diff.entities.added, vec![person("new", "N")]);
        assert_eq!(diff.entities.removed, vec![person("gone", "G")]);
        assert_eq!(diff.entities.updated[0].changed_fields, vec!["metadata"]);
        assert_eq!(diff.relations.removed.len(), 1);
        assert_eq!(diff.summary.total_added, 1);
        assert_eq!(diff.summary.total_removed, 2);
        assert_eq!(diff.summary.total_modified, 1);
        assert!(diff.annotations.preserved.is_empty());
    }

    #[test]
    fn test_field_removal_is_a_change() {
        let old = Snapshot::new().with_entities(vec![person("e1", "A").with_field("age", 3)]);
        let new = Snapshot::new().with_entities(vec![person("e1", "A")]);

        let diff = DiffEngine::diff(&old, &new).unwrap();
        assert_eq!(diff.entities.updated[0].changed_fields, vec!["age"]);
    }

    #[test]
    fn test_self_diff_is_empty() {
        let snapshot = Snapshot::new()
            .with_entities(vec![person("a", "A"), person("b", "B")])
            .with_relations(vec![Relation::new("r", "a", "b", "knows")]);

        let diff = DiffEngine::diff(&snapshot, &snapshot).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.summary, DiffSummary::default());
        assert_eq!(diff.total_changes(), 0);
    }

    #[test]
    fn test_reverse_matches_opposite_diff() {
        let a = Snapshot::new().with_entities(vec![person("x", "1"), person("y", "1"), person("z", "1")]);
        let b = Snapshot::new().with_entities(vec![person("w", "2"), person("z", "2"), person("x", "2")]);

        let forward = DiffEngine::diff(&a, &b).unwrap();
        let backward = DiffEngine::diff(&b, &a).unwrap();
        assert_eq!(DiffEngine::reverse(&forward), backward);
    }

    #[test]
    fn test_apply_reaches_target() {
        let a = Snapshot::new()
            .with_entities(vec![person("x", "1"), person("y", "1")])
            .with_relations(vec![Relation::new("r", "x", "y", "knows")]);
        let b = Snapshot::new()
            .with_entities(vec![person("y", "2"), person("z", "3")])
            .with_relations(vec![Relation::new("r", "x", "y", "knows").with_field("w", 1)]);

        let diff = DiffEngine::diff(&a, &b).unwrap();
        let applied = DiffEngine::apply(&a, &diff);
        assert!(applied.same_content(&b));

        let back = DiffEngine::apply(&applied, &DiffEngine::reverse(&diff));
        assert!(back.same_content(&a));
    }

    #[test]
    fn test_apply_removed_then_readded_id() {
        let base = Snapshot::new().with_entities(vec![person("e1", "old")]);
        let mut diff = Diff::default();
        diff.entities.removed.push(person("e1", "old"));
        diff.entities.added.push(person("e1", "fresh"));

        let applied = DiffEngine::apply(&base, &diff);
        assert_eq!(applied.entities, vec![person("e1", "fresh")]);
    }

    #[test]
    fn test_merge_later_wins() {
        let base = Snapshot::new().with_entities(vec![person("e1", "A"), person("e2", "A")]);
        let first = DiffEngine::diff(
            &base,
            &Snapshot::new().with_entities(vec![person("e1", "B"), person("e2", "A"), person("n", "1")]),
        )
        .unwrap();
        let second = DiffEngine::diff(
            &base,
            &Snapshot::new().with_entities(vec![person("e1", "C"), person("n", "2")]),
        )
        .unwrap();

        let merged = DiffEngine::merge(&first, &second);

        assert_eq!(merged.entities.added, vec![person("n", "2")]);
        assert_eq!(merged.entities.updated.len(), 1);
        assert_eq!(merged.entities.updated[0].after, person("e1", "C"));
        assert_eq!(merged.entities.removed, vec![person("e2", "A")]);
        assert_eq!(merged.summary.total_added, 1);
        assert_eq!(merged.summary.total_modified, 1);
        assert_eq!(merged.summary.total_removed, 1);
    }

    #[test]
    fn test_malformed_input_fails_fast() {
        let dup = Snapshot::new().with_entities(vec![person("e1", "A"), person("e1", "B")]);
        assert!(matches!(
            DiffEngine::diff(&dup, &Snapshot::new()),
            Err(Error::MalformedSnapshot(_))
        ));

        let err = DiffEngine::diff_json(&json!({"entities": "nope"}), &json!({})).unwrap_err();
        assert!(matches!(err, Error::MalformedSnapshot(_)));

        let diff = DiffEngine::diff_json(
            &json!({"entities": [{"id": "e1", "type": "Person", "name": "Alice"}]}),
            &json!({"entities": [{"id": "e1", "type": "Person", "name": "Bob"}]}),
        )
        .unwrap();
        assert_eq!(diff.summary.total_modified, 1);
    }
}
