//! Serialized graph state, the interchange format between the graph,
//! versioning and diffing

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::relation::Relation;
use crate::schema::RecordKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A stored record addressable by id
pub trait Record: Clone + PartialEq + Serialize {
    const KIND: RecordKind;

    fn record_id(&self) -> &str;
}

impl Record for Entity {
    const KIND: RecordKind = RecordKind::Entity;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Record for Relation {
    const KIND: RecordKind = RecordKind::Relation;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Plain-data copy of every entity and relation, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_relations(mut self, relations: Vec<Relation>) -> Self {
        self.relations = relations;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id.as_str() == id)
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id.as_str() == id)
    }

    /// Parse a snapshot from its JSON form
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| Error::MalformedSnapshot(e.to_string()))?;
        snapshot.check_unique_ids()?;
        Ok(snapshot)
    }

    /// Fail if any entity id or relation id appears twice
    pub fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.id.as_str()) {
                return Err(Error::MalformedSnapshot(format!(
                    "duplicate entity id '{}'",
                    entity.id
                )));
            }
        }
        seen.clear();
        for relation in &self.relations {
            if !seen.insert(relation.id.as_str()) {
                return Err(Error::MalformedSnapshot(format!(
                    "duplicate relation id '{}'",
                    relation.id
                )));
            }
        }
        Ok(())
    }

    /// Structural equality that ignores ordering: same ids with equal records
    pub fn same_content(&self, other: &Snapshot) -> bool {
        fn by_id<'a, T, F>(items: &'a [T], id: F) -> HashMap<&'a str, &'a T>
        where
            F: Fn(&'a T) -> &'a str,
        {
            items.iter().map(|item| (id(item), item)).collect()
        }

        self.entities.len() == other.entities.len()
            && self.relations.len() == other.relations.len()
            && by_id(&self.entities, |e| e.id.as_str())
                == by_id(&other.entities, |e| e.id.as_str())
            && by_id(&self.relations, |r| r.id.as_str())
                == by_id(&other.relations, |r| r.id.as_str())
    }
}
