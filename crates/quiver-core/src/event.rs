//! Synchronous event channel
//!
//! Mutation notifications are a closed set of typed variants. Each event
//! also has a dotted name (`graph.entity.added`, `version.created`, ...) so
//! subscribers can filter with an exact name or a wildcard suffix such as
//! `graph.entity.*`. Delivery is an in-stack call to every matching handler
//! in registration order.

use crate::entity::Entity;
use crate::relation::Relation;
use crate::schema::RecordKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default capacity of the replay buffer
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// A single graph mutation, as observed after it was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphEvent {
    EntityAdded { entity: Entity },
    EntityUpdated { before: Entity, after: Entity },
    EntityRemoved { entity: Entity },
    RelationAdded { relation: Relation },
    RelationUpdated { before: Relation, after: Relation },
    RelationRemoved { relation: Relation },
}

impl GraphEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntityAdded { .. } => "graph.entity.added",
            Self::EntityUpdated { .. } => "graph.entity.updated",
            Self::EntityRemoved { .. } => "graph.entity.removed",
            Self::RelationAdded { .. } => "graph.relation.added",
            Self::RelationUpdated { .. } => "graph.relation.updated",
            Self::RelationRemoved { .. } => "graph.relation.removed",
        }
    }

    pub fn target(&self) -> RecordKind {
        match self {
            Self::EntityAdded { .. } | Self::EntityUpdated { .. } | Self::EntityRemoved { .. } => {
                RecordKind::Entity
            }
            _ => RecordKind::Relation,
        }
    }

    /// Id of the record the event is about
    pub fn id(&self) -> &str {
        match self {
            Self::EntityAdded { entity } | Self::EntityRemoved { entity } => entity.id.as_str(),
            Self::EntityUpdated { after, .. } => after.id.as_str(),
            Self::RelationAdded { relation } | Self::RelationRemoved { relation } => {
                relation.id.as_str()
            }
            Self::RelationUpdated { after, .. } => after.id.as_str(),
        }
    }

    /// The entity state after the event, if it is an entity event that leaves one
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::EntityAdded { entity } | Self::EntityRemoved { entity } => Some(entity),
            Self::EntityUpdated { after, .. } => Some(after),
            _ => None,
        }
    }

    /// The relation state after the event, if it is a relation event
    pub fn relation(&self) -> Option<&Relation> {
        match self {
            Self::RelationAdded { relation } | Self::RelationRemoved { relation } => Some(relation),
            Self::RelationUpdated { after, .. } => Some(after),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Self::EntityAdded { entity } | Self::EntityRemoved { entity } => Some(entity),
            Self::EntityUpdated { after, .. } => Some(after),
            _ => None,
        }
    }

    pub fn into_relation(self) -> Option<Relation> {
        match self {
            Self::RelationAdded { relation } | Self::RelationRemoved { relation } => Some(relation),
            Self::RelationUpdated { after, .. } => Some(after),
            _ => None,
        }
    }
}

/// Every event the core produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Graph(GraphEvent),
    /// The store was bulk-replaced
    GraphLoaded { entities: usize, relations: usize },
    VersionCreated {
        version_id: String,
        parent_id: Option<String>,
        branch_id: String,
    },
    VersionSwitched { from: Option<String>, to: String },
    /// First mutation since the most recent snapshot
    VersionDirty { since: Option<String> },
    BranchCreated {
        branch_id: String,
        name: String,
        from_version_id: String,
    },
    BranchSwitched {
        from: String,
        to: String,
        head: Option<String>,
    },
    HistoryUndo { label: Option<String>, changes: usize },
    HistoryRedo { label: Option<String>, changes: usize },
    HistoryCleared,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Graph(event) => event.name(),
            Self::GraphLoaded { .. } => "graph.loaded",
            Self::VersionCreated { .. } => "version.created",
            Self::VersionSwitched { .. } => "version.switched",
            Self::VersionDirty { .. } => "version.dirty",
            Self::BranchCreated { .. } => "branch.created",
            Self::BranchSwitched { .. } => "branch.switched",
            Self::HistoryUndo { .. } => "history.undo",
            Self::HistoryRedo { .. } => "history.redo",
            Self::HistoryCleared => "history.cleared",
        }
    }

    pub fn as_graph(&self) -> Option<&GraphEvent> {
        match self {
            Self::Graph(event) => Some(event),
            _ => None,
        }
    }
}

impl From<GraphEvent> for Event {
    fn from(event: GraphEvent) -> Self {
        Self::Graph(event)
    }
}

/// Subscription filter over event names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPattern {
    /// Every event
    All,
    /// One event name
    Exact(String),
    /// Every name starting with the prefix (written `prefix.*`)
    Prefix(String),
}

impl EventPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Self::All
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Self::Prefix(prefix.to_string())
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(exact) => exact == name,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

impl From<&str> for EventPattern {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Recorded event with its emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

type Handler = Box<dyn FnMut(&Event) + Send>;

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    handler: Handler,
}

/// Synchronous publish/subscribe channel with a bounded replay buffer
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
    history: VecDeque<Envelope>,
    history_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("history", &self.history.len())
            .field("history_capacity", &self.history_capacity)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a bus keeping at most `capacity` envelopes; 0 disables the buffer
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 0,
            history: VecDeque::new(),
            history_capacity: capacity,
        }
    }

    pub fn subscribe<F>(&mut self, pattern: impl Into<EventPattern>, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            pattern: pattern.into(),
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Deliver to every matching subscriber in registration order, then record
    pub fn emit(&mut self, event: impl Into<Event>) {
        let event = event.into();
        let name = event.name();
        tracing::trace!(event = name, "emit");

        for subscription in &mut self.subscriptions {
            if subscription.pattern.matches(name) {
                (subscription.handler)(&event);
            }
        }

        if self.history_capacity > 0 {
            if self.history.len() == self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(Envelope {
                name: name.to_string(),
                event,
                timestamp: Utc::now(),
            });
        }
    }

    /// Recorded envelopes, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Envelope> {
        self.history.iter()
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Change the replay buffer size, dropping the oldest envelopes if needed
    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.history_capacity = capacity;
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
