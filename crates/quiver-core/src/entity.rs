//! Entity (node) types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use ulid::Ulid;

/// Ordered map of custom fields or metadata
pub type Fields = BTreeMap<String, Value>;

/// Unique identifier for an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
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

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Entity type classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub String);

impl EntityType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for EntityType {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

/// An entity in the graph (a node)
///
/// Serializes as `{ "id", "type", ...fields, "metadata" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier, immutable after creation
    pub id: EntityId,

    /// Entity type, immutable after creation
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Custom fields
    #[serde(flatten)]
    pub fields: Fields,

    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Fields,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, entity_type: impl Into<EntityType>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
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

    /// Get a custom field value
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Merge a patch into fields and metadata. `id` and `type` are untouched.
    pub fn apply_patch(&mut self, patch: &Patch) {
        for (key, value) in &patch.fields {
            self.fields.insert(key.clone(), value.clone());
        }
        for (key, value) in &patch.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Data for creating a new entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    /// Caller-supplied id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(default)]
    pub metadata: Fields,
}

impl NewEntity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
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

    /// Build the entity, assigning an id if none was supplied
    pub fn into_entity(self) -> Entity {
        Entity {
            id: self.id.unwrap_or_else(EntityId::generate),
            entity_type: self.entity_type.into(),
            fields: self.fields,
            metadata: self.metadata,
        }
    }
}

/// Partial update for an entity or relation
///
/// Keys in `fields` overwrite custom fields, keys in `metadata` overwrite
/// metadata entries. Structural attributes cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub metadata: Fields,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn set_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.metadata.is_empty()
    }
}
