//! Relation (edge) types

use crate::entity::{EntityId, Fields, Patch};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use ulid::Ulid;

/// Unique identifier for a relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub String);

impl RelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh ULID-backed id
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for RelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Direction declared by a relation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Directed,
    Undirected,
}

/// A relation (edge) between two entities
///
/// Serializes as `{ "id", "from", "to", "type", ...fields, "metadata" }`.
/// Endpoints are not required to exist in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Unique identifier
    pub id: RelationId,

    /// Source entity id
    pub from: EntityId,

    /// Target entity id
    pub to: EntityId,

    /// Type of relationship (e.g., "works_at", "mentors")
    #[serde(rename = "type")]
    pub relation_type: String,

    /// Custom fields
    #[serde(flatten)]
    pub fields: Fields,

    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Fields,
}

impl Relation {
    pub fn new(
        id: impl Into<RelationId>,
        from: impl Into<EntityId>,
        to: impl Into<EntityId>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            fields: Fields::new(),
            metadata: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True if either endpoint is the given entity
    pub fn touches(&self, entity: &str) -> bool {
        self.from.as_str() == entity || self.to.as_str() == entity
    }

    /// Merge a patch into fields and metadata. Endpoints and type are untouched.
    pub fn apply_patch(&mut self, patch: &Patch) {
        for (key, value) in &patch.fields {
            self.fields.insert(key.clone(), value.clone());
        }
        for (key, value) in &patch.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Data for creating a new relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRelation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RelationId>,
    pub from: EntityId,
    pub to: EntityId,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(default)]
    pub metadata: Fields,
}

impl NewRelation {
    pub fn new(
        from: impl Into<EntityId>,
        to: impl Into<EntityId>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            fields: Fields::new(),
            metadata: Fields::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<RelationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Build the relation, assigning an id if none was supplied
    pub fn into_relation(self) -> Relation {
        Relation {
            id: self.id.unwrap_or_else(RelationId::generate),
            from: self.from,
            to: self.to,
            relation_type: self.relation_type,
            fields: self.fields,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relation_serialized_layout() {
        let relation = Relation::new("r1", "e1", "e2", "knows").with_field("since", 2020);
        let value = serde_json::to_value(&relation).unwrap();

        assert_eq!(
            value,
            json!({"id": "r1", "from": "e1", "to": "e2", "type": "knows", "since": 2020, "metadata": {}})
        );
    }

    #[test]
    fn test_relation_touches() {
        let relation = Relation::new("r1", "e1", "e2", "knows");
        assert!(relation.touches("e1"));
        assert!(relation.touches("e2"));
        assert!(!relation.touches("e3"));
    }

    #[test]
    fn test_new_relation_with_weight_field() {
        let relation = NewRelation::new("a", "b", "mentors")
            .with_field("weight", 0.8)
            .into_relation();

        assert_eq!(relation.field("weight"), Some(&json!(0.8)));
        assert_eq!(relation.relation_type, "mentors");
    }
}
