//! Type registry and validation gate
//!
//! A [`Schema`] holds named entity and relation type definitions. Graph
//! mutations consult it before touching the store. Ordinary invalid data
//! never produces an error here: [`Schema::validate`] returns `false` and
//! keeps a human-readable message available through [`Schema::last_error`].
//! Only malformed registrations return `Err`.

use crate::entity::{Entity, Fields};
use crate::error::{Error, Result};
use crate::limits::{validate_type_name, RESERVED_FIELD_NAMES};
use crate::relation::{Direction, Relation};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Which kind of record a value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Entity,
    Relation,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relation => "relation",
        }
    }

    /// Infer the kind from a serialized record: relations carry `from` and `to`
    pub fn infer(value: &Value) -> Self {
        match value.as_object() {
            Some(obj) if obj.contains_key("from") && obj.contains_key("to") => Self::Relation,
            _ => Self::Entity,
        }
    }
}

/// JSON type a field value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Constraint on a single field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraint {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Inclusive lower bound for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound for numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum length for strings (chars) and arrays (elements)
    #[serde(default, alias = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length for strings (chars) and arrays (elements)
    #[serde(default, alias = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Regular expression string values must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FieldConstraint {
    pub fn of_type(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    fn check_bounds(&self, owner: &str, field: &str) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(Error::InvalidSchema(format!(
                    "{}.{}: min {} exceeds max {}",
                    owner, field, min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(Error::InvalidSchema(format!(
                    "{}.{}: min_length {} exceeds max_length {}",
                    owner, field, min, max
                )));
            }
        }
        Ok(())
    }
}

/// Definition of an entity type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDef {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, FieldConstraint>,
    #[serde(default)]
    pub metadata: Fields,
}

impl EntityTypeDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn optional(mut self, field: impl Into<String>) -> Self {
        self.optional.push(field.into());
        self
    }

    pub fn constrain(mut self, field: impl Into<String>, constraint: FieldConstraint) -> Self {
        self.constraints.insert(field.into(), constraint);
        self
    }
}

/// Declaration of one relation property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub constraint: FieldConstraint,
}

/// Definition of a relation type
///
/// Empty `source`/`target` lists (or a `"*"` entry) accept any entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationTypeDef {
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDef>,
}

impl RelationTypeDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, entity_type: impl Into<String>) -> Self {
        self.source.push(entity_type.into());
        self
    }

    pub fn target(mut self, entity_type: impl Into<String>) -> Self {
        self.target.push(entity_type.into());
        self
    }

    pub fn undirected(mut self) -> Self {
        self.direction = Direction::Undirected;
        self
    }

    pub fn property(mut self, name: impl Into<String>, def: PropertyDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    fn accepts(allowed: &[String], entity_type: &str) -> bool {
        allowed.is_empty() || allowed.iter().any(|t| t == "*" || t == entity_type)
    }
}

/// Declarative bundle of type definitions, as read from external configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub entity_types: BTreeMap<String, EntityTypeDef>,
    #[serde(default)]
    pub relation_types: BTreeMap<String, RelationTypeDef>,
}

#[derive(Debug, Clone)]
struct CompiledEntityType {
    def: EntityTypeDef,
    patterns: HashMap<String, Regex>,
}

#[derive(Debug, Clone)]
struct CompiledRelationType {
    def: RelationTypeDef,
    patterns: HashMap<String, Regex>,
}

fn compile_patterns<'a>(
    owner: &str,
    constraints: impl Iterator<Item = (&'a String, &'a FieldConstraint)>,
) -> Result<HashMap<String, Regex>> {
    let mut patterns = HashMap::new();
    for (field, constraint) in constraints {
        constraint.check_bounds(owner, field)?;
        if let Some(pattern) = &constraint.pattern {
            let regex = Regex::new(pattern).map_err(|e| {
                Error::InvalidSchema(format!("{}.{}: invalid pattern: {}", owner, field, e))
            })?;
            patterns.insert(field.clone(), regex);
        }
    }
    Ok(patterns)
}

/// Check one present value against its constraint
fn check_value(
    owner: &str,
    field: &str,
    value: &Value,
    constraint: &FieldConstraint,
    pattern: Option<&Regex>,
) -> std::result::Result<(), String> {
    if let Some(expected) = constraint.field_type {
        if !expected.matches(value) {
            return Err(format!(
                "{}.{}: expected {}, got {}",
                owner,
                field,
                expected.as_str(),
                json_type_name(value)
            ));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = constraint.min {
            if n < min {
                return Err(format!(
                    "{}.{}: value {} is below minimum {}",
                    owner, field, n, min
                ));
            }
        }
        if let Some(max) = constraint.max {
            if n > max {
                return Err(format!(
                    "{}.{}: value {} is above maximum {}",
                    owner, field, n, max
                ));
            }
        }
    }

    let len = match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    };
    if let Some(len) = len {
        if let Some(min) = constraint.min_length {
            if len < min {
                return Err(format!(
                    "{}.{}: length {} is below minimum length {}",
                    owner, field, len, min
                ));
            }
        }
        if let Some(max) = constraint.max_length {
            if len > max {
                return Err(format!(
                    "{}.{}: length {} is above maximum length {}",
                    owner, field, len, max
                ));
            }
        }
    }

    if let (Some(regex), Value::String(s)) = (pattern, value) {
        if !regex.is_match(s) {
            return Err(format!(
                "{}.{}: value '{}' does not match pattern '{}'",
                owner,
                field,
                s,
                regex.as_str()
            ));
        }
    }

    Ok(())
}

fn present<'a>(lookup: &impl Fn(&str) -> Option<&'a Value>, field: &str) -> Option<&'a Value> {
    lookup(field).filter(|v| !v.is_null())
}

/// Registry of entity and relation types
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entity_types: BTreeMap<String, CompiledEntityType>,
    relation_types: BTreeMap<String, CompiledRelationType>,
    last_error: Option<String>,
    strict: bool,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema preloaded with the baseline type set
    pub fn with_defaults() -> Self {
        let mut schema = Self::new();
        schema.load_defaults();
        schema
    }

    /// Create a schema, loading the baseline types when `load_defaults` is set
    pub fn create(load_defaults: bool) -> Self {
        if load_defaults {
            Self::with_defaults()
        } else {
            Self::new()
        }
    }

    /// Build a schema from a declarative definition
    pub fn from_definition(definition: SchemaDefinition) -> Result<Self> {
        let mut schema = Self::new();
        schema.register_all(definition)?;
        Ok(schema)
    }

    /// Reject records whose type is not registered
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn load_defaults(&mut self) {
        let name = || {
            EntityTypeDef::new()
                .require("name")
                .constrain("name", FieldConstraint::of_type(FieldType::String).min_length(1))
        };
        let defaults = [
            ("Person", name()),
            ("Organization", name()),
            ("Concept", name()),
            (
                "Document",
                EntityTypeDef::new()
                    .require("title")
                    .optional("url")
                    .constrain("title", FieldConstraint::of_type(FieldType::String).min_length(1)),
            ),
        ];
        for (type_name, def) in defaults {
            self.entity_types.insert(
                type_name.to_string(),
                CompiledEntityType {
                    def,
                    patterns: HashMap::new(),
                },
            );
        }
        for type_name in ["related_to", "part_of", "references"] {
            self.relation_types.insert(
                type_name.to_string(),
                CompiledRelationType {
                    def: RelationTypeDef::new(),
                    patterns: HashMap::new(),
                },
            );
        }
    }

    /// Register an entity type. Fails if the name is taken or the definition is malformed.
    pub fn register_entity_type(&mut self, name: impl Into<String>, def: EntityTypeDef) -> Result<()> {
        let name = name.into();
        validate_type_name(&name).map_err(|e| Error::InvalidSchema(e.to_string()))?;
        if self.entity_types.contains_key(&name) {
            return Err(Error::DuplicateType(name));
        }
        if let Some(field) = def
            .required
            .iter()
            .chain(&def.optional)
            .find(|f| RESERVED_FIELD_NAMES.contains(&f.as_str()))
        {
            return Err(Error::InvalidSchema(format!(
                "{}: field name '{}' is reserved",
                name, field
            )));
        }
        let patterns = compile_patterns(&name, def.constraints.iter())?;
        tracing::debug!(type_name = %name, "registered entity type");
        self.entity_types
            .insert(name, CompiledEntityType { def, patterns });
        Ok(())
    }

    /// Register a relation type. Fails if the name is taken or the definition is malformed.
    pub fn register_relation_type(
        &mut self,
        name: impl Into<String>,
        def: RelationTypeDef,
    ) -> Result<()> {
        let name = name.into();
        validate_type_name(&name).map_err(|e| Error::InvalidSchema(e.to_string()))?;
        if self.relation_types.contains_key(&name) {
            return Err(Error::DuplicateType(name));
        }
        let patterns = compile_patterns(
            &name,
            def.properties.iter().map(|(field, p)| (field, &p.constraint)),
        )?;
        tracing::debug!(type_name = %name, "registered relation type");
        self.relation_types
            .insert(name, CompiledRelationType { def, patterns });
        Ok(())
    }

    /// Register every type in a definition bundle; stops at the first failure
    pub fn register_all(&mut self, definition: SchemaDefinition) -> Result<()> {
        for (name, def) in definition.entity_types {
            self.register_entity_type(name, def)?;
        }
        for (name, def) in definition.relation_types {
            self.register_relation_type(name, def)?;
        }
        Ok(())
    }

    /// Remove all registered types and the last error
    pub fn clear(&mut self) {
        self.entity_types.clear();
        self.relation_types.clear();
        self.last_error = None;
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeDef> {
        self.entity_types.get(name).map(|c| &c.def)
    }

    pub fn relation_type(&self, name: &str) -> Option<&RelationTypeDef> {
        self.relation_types.get(name).map(|c| &c.def)
    }

    pub fn entity_type_names(&self) -> Vec<&str> {
        self.entity_types.keys().map(String::as_str).collect()
    }

    pub fn relation_type_names(&self) -> Vec<&str> {
        self.relation_types.keys().map(String::as_str).collect()
    }

    /// Message describing the most recent validation failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Validate a serialized record. `kind` is inferred from shape when `None`.
    pub fn validate(&mut self, value: &Value, kind: Option<RecordKind>) -> bool {
        let outcome = self.check_value_record(value, kind);
        self.finish(outcome)
    }

    pub fn validate_entity(&mut self, entity: &Entity) -> bool {
        let outcome = self.check_entity(entity.entity_type.as_str(), &|f| entity.fields.get(f));
        self.finish(outcome)
    }

    pub fn validate_relation(&mut self, relation: &Relation) -> bool {
        let outcome = self.check_relation(&relation.relation_type, &|f| relation.fields.get(f));
        self.finish(outcome)
    }

    /// Check a relation's endpoint entity types against its definition
    pub fn check_endpoints(&mut self, relation_type: &str, from_type: &str, to_type: &str) -> bool {
        let outcome = match self.relation_types.get(relation_type) {
            None => Ok(()),
            Some(compiled) => {
                let def = &compiled.def;
                let forward = RelationTypeDef::accepts(&def.source, from_type)
                    && RelationTypeDef::accepts(&def.target, to_type);
                let backward = def.direction == Direction::Undirected
                    && RelationTypeDef::accepts(&def.source, to_type)
                    && RelationTypeDef::accepts(&def.target, from_type);
                if forward || backward {
                    Ok(())
                } else {
                    Err(format!(
                        "{}: endpoints {} -> {} not allowed (source {:?}, target {:?})",
                        relation_type, from_type, to_type, def.source, def.target
                    ))
                }
            }
        };
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: std::result::Result<(), String>) -> bool {
        match outcome {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(message) => {
                tracing::debug!(%message, "schema validation failed");
                self.last_error = Some(message);
                false
            }
        }
    }

    fn check_value_record(
        &self,
        value: &Value,
        kind: Option<RecordKind>,
    ) -> std::result::Result<(), String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected an object, got {}", json_type_name(value)))?;
        let kind = kind.unwrap_or_else(|| RecordKind::infer(value));
        let type_name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("{} is missing a string 'type'", kind.as_str()))?;
        let lookup = |field: &str| {
            if RESERVED_FIELD_NAMES.contains(&field) {
                None
            } else {
                obj.get(field)
            }
        };
        match kind {
            RecordKind::Entity => self.check_entity(type_name, &lookup),
            RecordKind::Relation => {
                for endpoint in ["from", "to"] {
                    if !obj.get(endpoint).map_or(false, Value::is_string) {
                        return Err(format!("relation is missing a string '{}'", endpoint));
                    }
                }
                self.check_relation(type_name, &lookup)
            }
        }
    }

    fn check_entity<'a>(
        &self,
        type_name: &str,
        lookup: &impl Fn(&str) -> Option<&'a Value>,
    ) -> std::result::Result<(), String> {
        let Some(compiled) = self.entity_types.get(type_name) else {
            return self.unknown(RecordKind::Entity, type_name);
        };
        for field in &compiled.def.required {
            if present(lookup, field).is_none() {
                return Err(format!("{}: missing required field '{}'", type_name, field));
            }
        }
        for (field, constraint) in &compiled.def.constraints {
            if let Some(value) = present(lookup, field) {
                check_value(
                    type_name,
                    field,
                    value,
                    constraint,
                    compiled.patterns.get(field),
                )?;
            }
        }
        Ok(())
    }

    fn check_relation<'a>(
        &self,
        type_name: &str,
        lookup: &impl Fn(&str) -> Option<&'a Value>,
    ) -> std::result::Result<(), String> {
        let Some(compiled) = self.relation_types.get(type_name) else {
            return self.unknown(RecordKind::Relation, type_name);
        };
        for (field, property) in &compiled.def.properties {
            match present(lookup, field) {
                None if property.required => {
                    return Err(format!(
                        "{}: missing required property '{}'",
                        type_name, field
                    ));
                }
                None => {}
                Some(value) => check_value(
                    type_name,
                    field,
                    value,
                    &property.constraint,
                    compiled.patterns.get(field),
                )?,
            }
        }
        Ok(())
    }

    fn unknown(&self, kind: RecordKind, type_name: &str) -> std::result::Result<(), String> {
        if self.strict {
            Err(format!("unknown {} type '{}'", kind.as_str(), type_name))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .register_entity_type(
                "Person",
                EntityTypeDef::new()
                    .require("name")
                    .optional("age")
                    .optional("email")
                    .constrain("name", FieldConstraint::of_type(FieldType::String).max_length(5))
                    .constrain("age", FieldConstraint::of_type(FieldType::Integer).min(0.0).max(150.0))
                    .constrain("email", FieldConstraint::of_type(FieldType::String).pattern(r"^[^@]+@[^@]+$")),
            )
            .unwrap();
        schema
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut schema = person_schema();
        let err = schema
            .register_entity_type("Person", EntityTypeDef::new())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateType(name) if name == "Person"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut schema = Schema::new();
        let err = schema
            .register_entity_type(
                "Bad",
                EntityTypeDef::new().constrain("x", FieldConstraint::default().pattern("(")),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
        assert!(schema.entity_type("Bad").is_none());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut schema = Schema::new();
        let err = schema
            .register_entity_type(
                "Bad",
                EntityTypeDef::new().constrain("n", FieldConstraint::default().min(5.0).max(1.0)),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_required_field() {
        let mut schema = person_schema();
        assert!(schema.validate(&json!({"id": "e1", "type": "Person", "name": "Ann"}), None));
        assert!(schema.last_error().is_none());

        assert!(!schema.validate(&json!({"id": "e1", "type": "Person"}), None));
        assert_eq!(
            schema.last_error(),
            Some("Person: missing required field 'name'")
        );

        assert!(!schema.validate(&json!({"type": "Person", "name": null}), None));
    }

    #[test]
    fn test_constraints() {
        let mut schema = person_schema();

        assert!(!schema.validate(&json!({"type": "Person", "name": "Annabelle"}), None));
        assert!(schema.last_error().unwrap().contains("maximum length 5"));

        assert!(!schema.validate(&json!({"type": "Person", "name": "Ann", "age": -1}), None));
        assert!(schema.last_error().unwrap().contains("Person.age"));

        assert!(!schema.validate(&json!({"type": "Person", "name": "Ann", "age": 1.5}), None));
        assert!(schema.last_error().unwrap().contains("expected integer"));

        assert!(!schema.validate(&json!({"type": "Person", "name": "Ann", "email": "nope"}), None));
        assert!(schema.last_error().unwrap().contains("pattern"));

        assert!(schema.validate(
            &json!({"type": "Person", "name": "Ann", "age": 40, "email": "a@b.c"}),
            None
        ));
    }

    #[test]
    fn test_unknown_types_and_strict_mode() {
        let mut schema = person_schema();
        assert!(schema.validate(&json!({"type": "Robot"}), None));

        let mut strict = person_schema().strict(true);
        assert!(!strict.validate(&json!({"type": "Robot"}), None));
        assert_eq!(strict.last_error(), Some("unknown entity type 'Robot'"));
    }

    #[test]
    fn test_kind_inference_and_relation_properties() {
        let mut schema = Schema::new();
        schema
            .register_relation_type(
                "works_at",
                RelationTypeDef::new().property(
                    "since",
                    PropertyDef {
                        required: true,
                        constraint: FieldConstraint::of_type(FieldType::Integer),
                    },
                ),
            )
            .unwrap();

        let relation = json!({"id": "r1", "from": "a", "to": "b", "type": "works_at"});
        assert_eq!(RecordKind::infer(&relation), RecordKind::Relation);
        assert!(!schema.validate(&relation, None));
        assert!(schema.last_error().unwrap().contains("since"));

        let relation = json!({"from": "a", "to": "b", "type": "works_at", "since": 2019});
        assert!(schema.validate(&relation, None));

        assert!(!schema.validate(&json!({"from": "a", "type": "works_at"}), Some(RecordKind::Relation)));
    }

    #[test]
    fn test_non_object_fails_without_panicking() {
        let mut schema = person_schema();
        assert!(!schema.validate(&json!(42), None));
        assert_eq!(schema.last_error(), Some("expected an object, got number"));
    }

    #[test]
    fn test_endpoint_types() {
        let mut schema = Schema::new();
        schema
            .register_relation_type(
                "employs",
                RelationTypeDef::new().source("Organization").target("Person"),
            )
            .unwrap();

        assert!(schema.check_endpoints("employs", "Organization", "Person"));
        assert!(!schema.check_endpoints("employs", "Person", "Organization"));
        assert!(schema.check_endpoints("unregistered", "X", "Y"));
    }

    #[test]
    fn test_defaults_and_clear() {
        let mut schema = Schema::with_defaults();
        assert!(schema.entity_type("Person").is_some());
        assert!(schema.relation_type("related_to").is_some());
        assert!(!schema.validate(&json!({"type": "Document"}), None));

        schema.clear();
        assert!(schema.entity_type_names().is_empty());
        assert!(schema.relation_type_names().is_empty());
        assert!(schema.last_error().is_none());
        assert!(Schema::create(false).entity_type_names().is_empty());
    }

    #[test]
    fn test_definition_from_json() {
        let definition: SchemaDefinition = serde_json::from_value(json!({
            "entity_types": {
                "Task": {
                    "required": ["title"],
                    "constraints": {"title": {"type": "string", "minLength": 3}}
                }
            },
            "relation_types": {
                "blocks": {"source": ["Task"], "target": ["Task"]}
            }
        }))
        .unwrap();

        let mut schema = Schema::from_definition(definition).unwrap();
        assert!(!schema.validate(&json!({"type": "Task", "title": "ab"}), None));
        assert!(schema.validate(&json!({"type": "Task", "title": "abc"}), None));
        assert!(schema.check_endpoints("blocks", "Task", "Task"));
    }
}
