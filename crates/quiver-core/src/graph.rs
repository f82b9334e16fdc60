//! The entity/relation store
//!
//! Every mutation runs validate → mutate → emit. A rejected mutation leaves
//! the store untouched and emits nothing. Records live in dense vectors with
//! an id → position index, so [`Graph::serialize`] is a straight copy in
//! insertion order.

use crate::entity::{Entity, EntityId, NewEntity, Patch};
use crate::error::{Error, Result};
use crate::event::{Event, EventBus, EventPattern, GraphEvent, SubscriptionId};
use crate::limits::{validate_field_names, validate_id, validate_type_name};
use crate::relation::{NewRelation, Relation, RelationId};
use crate::schema::Schema;
use crate::snapshot::{Record, Snapshot};
use std::collections::HashMap;

/// A single mutation request
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddEntity(NewEntity),
    /// Add a fully formed entity, keeping its id
    InsertEntity(Entity),
    UpdateEntity { id: EntityId, patch: Patch },
    /// Replace fields and metadata wholesale; id and type must match
    ReplaceEntity(Entity),
    RemoveEntity(EntityId),
    AddRelation(NewRelation),
    InsertRelation(Relation),
    UpdateRelation { id: RelationId, patch: Patch },
    ReplaceRelation(Relation),
    RemoveRelation(RelationId),
}

/// Dense storage with an id index
#[derive(Debug, Clone)]
struct Arena<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Arena<T> {
    fn from_items(items: Vec<T>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.record_id().to_string(), i))
            .collect();
        Self { items, index }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn push(&mut self, item: T) {
        self.index
            .insert(item.record_id().to_string(), self.items.len());
        self.items.push(item);
    }

    /// Replace the stored record with the same id, returning the previous one
    fn replace(&mut self, item: T) -> Option<T> {
        let &i = self.index.get(item.record_id())?;
        Some(std::mem::replace(&mut self.items[i], item))
    }

    fn remove(&mut self, id: &str) -> Option<T> {
        let i = self.index.remove(id)?;
        let item = self.items.remove(i);
        for (offset, moved) in self.items[i..].iter().enumerate() {
            self.index.insert(moved.record_id().to_string(), i + offset);
        }
        Some(item)
    }
}

/// In-memory graph of entities and relations
#[derive(Debug, Default)]
pub struct Graph {
    entities: Arena<Entity>,
    relations: Arena<Relation>,
    schema: Option<Schema>,
    events: EventBus,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a schema that gates every mutation
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn schema_mut(&mut self) -> Option<&mut Schema> {
        self.schema.as_mut()
    }

    pub fn set_schema(&mut self, schema: Option<Schema>) {
        self.schema = schema;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The channel graph, version and history events are published on
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn subscribe<F>(&mut self, pattern: impl Into<EventPattern>, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.subscribe(pattern, handler)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Owned copy of an entity
    pub fn get_entity(&self, id: &str) -> Option<Entity> {
        self.entities.get(id).cloned()
    }

    /// Owned copy of a relation
    pub fn get_relation(&self, id: &str) -> Option<Relation> {
        self.relations.get(id).cloned()
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.entities.contains(id)
    }

    pub fn contains_relation(&self, id: &str) -> bool {
        self.relations.contains(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.items.iter()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.items.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.items.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.items.len()
    }

    /// Relations with the entity as either endpoint
    pub fn relations_touching(&self, entity_id: &str) -> Vec<&Relation> {
        self.relations
            .items
            .iter()
            .filter(|r| r.touches(entity_id))
            .collect()
    }

    /// Plain-data copy of the whole store in insertion order
    pub fn serialize(&self) -> Snapshot {
        Snapshot {
            entities: self.entities.items.clone(),
            relations: self.relations.items.clone(),
        }
    }

    /// Bulk-replace the store. Items are trusted and not validated; a single
    /// `graph.loaded` event is emitted instead of per-item events.
    pub fn load(&mut self, snapshot: Snapshot) -> Result<()> {
        snapshot.check_unique_ids()?;
        let (entities, relations) = (snapshot.entities.len(), snapshot.relations.len());
        self.entities = Arena::from_items(snapshot.entities);
        self.relations = Arena::from_items(snapshot.relations);
        tracing::debug!(entities, relations, "graph loaded");
        self.events.emit(Event::GraphLoaded {
            entities,
            relations,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an entity, generating an id if none was given
    pub fn add_entity(&mut self, new: NewEntity) -> Result<Entity> {
        let entity = self.store_entity(new.into_entity())?;
        self.publish(GraphEvent::EntityAdded {
            entity: entity.clone(),
        });
        Ok(entity)
    }

    /// Merge a patch into an entity's fields and metadata
    pub fn update_entity(&mut self, id: &str, patch: Patch) -> Result<Entity> {
        let (before, after) = self.patch_entity(id, &patch)?;
        self.publish(GraphEvent::EntityUpdated {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    pub fn remove_entity(&mut self, id: &str) -> Result<Entity> {
        let entity = self
            .entities
            .remove(id)
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))?;
        self.publish(GraphEvent::EntityRemoved {
            entity: entity.clone(),
        });
        Ok(entity)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relation mutations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_relation(&mut self, new: NewRelation) -> Result<Relation> {
        let relation = self.store_relation(new.into_relation())?;
        self.publish(GraphEvent::RelationAdded {
            relation: relation.clone(),
        });
        Ok(relation)
    }

    pub fn update_relation(&mut self, id: &str, patch: Patch) -> Result<Relation> {
        let (before, after) = self.patch_relation(id, &patch)?;
        self.publish(GraphEvent::RelationUpdated {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    pub fn remove_relation(&mut self, id: &str) -> Result<Relation> {
        let relation = self
            .relations
            .remove(id)
            .ok_or_else(|| Error::RelationNotFound(id.to_string()))?;
        self.publish(GraphEvent::RelationRemoved {
            relation: relation.clone(),
        });
        Ok(relation)
    }

    /// Run one operation and return the event it emitted
    pub fn apply(&mut self, operation: Operation) -> Result<GraphEvent> {
        let event = self.apply_deferred(operation)?;
        self.publish(event.clone());
        Ok(event)
    }

    /// Run one operation without notifying subscribers. The caller owns the
    /// returned event and hands it to [`Graph::publish_all`] once it commits.
    pub fn apply_deferred(&mut self, operation: Operation) -> Result<GraphEvent> {
        let event = match operation {
            Operation::AddEntity(new) => GraphEvent::EntityAdded {
                entity: self.store_entity(new.into_entity())?,
            },
            Operation::InsertEntity(entity) => GraphEvent::EntityAdded {
                entity: self.store_entity(entity)?,
            },
            Operation::UpdateEntity { id, patch } => {
                let (before, after) = self.patch_entity(id.as_str(), &patch)?;
                GraphEvent::EntityUpdated { before, after }
            }
            Operation::ReplaceEntity(entity) => {
                let (before, after) = self.replace_entity(entity)?;
                GraphEvent::EntityUpdated { before, after }
            }
            Operation::RemoveEntity(id) => GraphEvent::EntityRemoved {
                entity: self
                    .entities
                    .remove(id.as_str())
                    .ok_or_else(|| Error::EntityNotFound(id.0))?,
            },
            Operation::AddRelation(new) => GraphEvent::RelationAdded {
                relation: self.store_relation(new.into_relation())?,
            },
            Operation::InsertRelation(relation) => GraphEvent::RelationAdded {
                relation: self.store_relation(relation)?,
            },
            Operation::UpdateRelation { id, patch } => {
                let (before, after) = self.patch_relation(id.as_str(), &patch)?;
                GraphEvent::RelationUpdated { before, after }
            }
            Operation::ReplaceRelation(relation) => {
                let (before, after) = self.replace_relation(relation)?;
                GraphEvent::RelationUpdated { before, after }
            }
            Operation::RemoveRelation(id) => GraphEvent::RelationRemoved {
                relation: self
                    .relations
                    .remove(id.as_str())
                    .ok_or_else(|| Error::RelationNotFound(id.0))?,
            },
        };
        Ok(event)
    }

    /// Emit events produced by [`Graph::apply_deferred`], in order
    pub fn publish_all(&mut self, events: impl IntoIterator<Item = GraphEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn publish(&mut self, event: GraphEvent) {
        tracing::debug!(event = event.name(), id = event.id(), "graph mutation");
        self.events.emit(event);
    }

    fn store_entity(&mut self, entity: Entity) -> Result<Entity> {
        validate_id(entity.id.as_str())?;
        validate_type_name(entity.entity_type.as_str())?;
        validate_field_names(entity.fields.keys())?;
        if self.entities.contains(entity.id.as_str()) {
            return Err(Error::DuplicateId(entity.id.0));
        }
        self.check_entity(&entity)?;
        self.entities.push(entity.clone());
        Ok(entity)
    }

    fn patch_entity(&mut self, id: &str, patch: &Patch) -> Result<(Entity, Entity)> {
        let before = self
            .entities
            .get(id)
            .cloned()
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))?;
        validate_field_names(patch.fields.keys())?;
        let mut after = before.clone();
        after.apply_patch(patch);
        self.check_entity(&after)?;
        self.entities.replace(after.clone());
        Ok((before, after))
    }

    fn replace_entity(&mut self, entity: Entity) -> Result<(Entity, Entity)> {
        let current = self
            .entities
            .get(entity.id.as_str())
            .ok_or_else(|| Error::EntityNotFound(entity.id.0.clone()))?;
        if current.entity_type != entity.entity_type {
            return Err(Error::Validation(format!(
                "{}: entity type is immutable ({} -> {})",
                entity.id,
                current.entity_type.as_str(),
                entity.entity_type.as_str()
            )));
        }
        validate_field_names(entity.fields.keys())?;
        self.check_entity(&entity)?;
        let before = self
            .entities
            .replace(entity.clone())
            .ok_or_else(|| Error::EntityNotFound(entity.id.0.clone()))?;
        Ok((before, entity))
    }

    fn store_relation(&mut self, relation: Relation) -> Result<Relation> {
        validate_id(relation.id.as_str())?;
        validate_id(relation.from.as_str())?;
        validate_id(relation.to.as_str())?;
        validate_type_name(&relation.relation_type)?;
        validate_field_names(relation.fields.keys())?;
        if self.relations.contains(relation.id.as_str()) {
            return Err(Error::DuplicateId(relation.id.0));
        }
        self.check_relation(&relation)?;
        self.relations.push(relation.clone());
        Ok(relation)
    }

    fn patch_relation(&mut self, id: &str, patch: &Patch) -> Result<(Relation, Relation)> {
        let before = self
            .relations
            .get(id)
            .cloned()
            .ok_or_else(|| Error::RelationNotFound(id.to_string()))?;
        validate_field_names(patch.fields.keys())?;
        let mut after = before.clone();
        after.apply_patch(patch);
        self.check_relation(&after)?;
        self.relations.replace(after.clone());
        Ok((before, after))
    }

    fn replace_relation(&mut self, relation: Relation) -> Result<(Relation, Relation)> {
        let current = self
            .relations
            .get(relation.id.as_str())
            .ok_or_else(|| Error::RelationNotFound(relation.id.0.clone()))?;
        if current.from != relation.from
            || current.to != relation.to
            || current.relation_type != relation.relation_type
        {
            return Err(Error::Validation(format!(
                "{}: relation endpoints and type are immutable",
                relation.id
            )));
        }
        validate_field_names(relation.fields.keys())?;
        self.check_relation(&relation)?;
        let before = self
            .relations
            .replace(relation.clone())
            .ok_or_else(|| Error::RelationNotFound(relation.id.0.clone()))?;
        Ok((before, relation))
    }

    fn check_entity(&mut self, entity: &Entity) -> Result<()> {
        if let Some(schema) = self.schema.as_mut() {
            if !schema.validate_entity(entity) {
                return Err(rejected(schema));
            }
        }
        Ok(())
    }

    fn check_relation(&mut self, relation: &Relation) -> Result<()> {
        let Some(schema) = self.schema.as_mut() else {
            return Ok(());
        };
        if !schema.validate_relation(relation) {
            return Err(rejected(schema));
        }
        let endpoints = (
            self.entities.get(relation.from.as_str()),
            self.entities.get(relation.to.as_str()),
        );
        if let (Some(from), Some(to)) = endpoints {
            if !schema.check_endpoints(
                &relation.relation_type,
                from.entity_type.as_str(),
                to.entity_type.as_str(),
            ) {
                return Err(rejected(schema));
            }
        }
        Ok(())
    }
}

fn rejected(schema: &Schema) -> Error {
    Error::Validation(
        schema
            .last_error()
            .unwrap_or("rejected by schema")
            .to_string(),
    )
}
