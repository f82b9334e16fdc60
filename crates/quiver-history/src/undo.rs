//! Undo/redo built from observed graph mutations
//!
//! Every recorded graph event becomes a [`Change`] that knows how to run
//! itself backwards ([`Change::inverse`]) and forwards ([`Change::forward`]).
//! Changes made while a batch is open are grouped into one [`Command`].
//!
//! Replayed changes are tagged [`Origin::Replay`] by the caller and never
//! re-recorded, so undo and redo cannot feed their own effects back into the
//! stacks.

use crate::error::{HistoryError, HistoryResult};
use quiver_core::limits::MAX_UNDO_SIZE;
use quiver_core::{Entity, Event, EventBus, Graph, GraphEvent, Operation, RecordKind, Relation};
use std::collections::VecDeque;

/// Where a graph event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A caller mutation; recorded and clears the redo stack
    User,
    /// Produced while replaying undo/redo; ignored
    Replay,
}

/// A full record captured from a graph event
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Entity(Entity),
    Relation(Relation),
}

impl Item {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Entity(_) => RecordKind::Entity,
            Self::Relation(_) => RecordKind::Relation,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Entity(entity) => entity.id.as_str(),
            Self::Relation(relation) => relation.id.as_str(),
        }
    }

    fn insert(&self) -> Operation {
        match self {
            Self::Entity(entity) => Operation::InsertEntity(entity.clone()),
            Self::Relation(relation) => Operation::InsertRelation(relation.clone()),
        }
    }

    fn replace(&self) -> Operation {
        match self {
            Self::Entity(entity) => Operation::ReplaceEntity(entity.clone()),
            Self::Relation(relation) => Operation::ReplaceRelation(relation.clone()),
        }
    }

    fn remove(&self) -> Operation {
        match self {
            Self::Entity(entity) => Operation::RemoveEntity(entity.id.clone()),
            Self::Relation(relation) => Operation::RemoveRelation(relation.id.clone()),
        }
    }
}

/// Kind of a recorded change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Update,
    Remove,
}

/// One recorded mutation with enough state to reverse it
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added(Item),
    Updated { before: Item, after: Item },
    Removed(Item),
}

impl Change {
    pub fn from_event(event: &GraphEvent) -> Self {
        match event {
            GraphEvent::EntityAdded { entity } => Self::Added(Item::Entity(entity.clone())),
            GraphEvent::EntityUpdated { before, after } => Self::Updated {
                before: Item::Entity(before.clone()),
                after: Item::Entity(after.clone()),
            },
            GraphEvent::EntityRemoved { entity } => Self::Removed(Item::Entity(entity.clone())),
            GraphEvent::RelationAdded { relation } => {
                Self::Added(Item::Relation(relation.clone()))
            }
            GraphEvent::RelationUpdated { before, after } => Self::Updated {
                before: Item::Relation(before.clone()),
                after: Item::Relation(after.clone()),
            },
            GraphEvent::RelationRemoved { relation } => {
                Self::Removed(Item::Relation(relation.clone()))
            }
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Added(_) => ChangeKind::Add,
            Self::Updated { .. } => ChangeKind::Update,
            Self::Removed(_) => ChangeKind::Remove,
        }
    }

    pub fn target(&self) -> RecordKind {
        match self {
            Self::Added(item) | Self::Removed(item) => item.kind(),
            Self::Updated { after, .. } => after.kind(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Added(item) | Self::Removed(item) => item.id(),
            Self::Updated { after, .. } => after.id(),
        }
    }

    /// Operation that undoes this change
    pub fn inverse(&self) -> Operation {
        match self {
            Self::Added(item) => item.remove(),
            Self::Updated { before, .. } => before.replace(),
            Self::Removed(item) => item.insert(),
        }
    }

    /// Operation that re-applies this change
    pub fn forward(&self) -> Operation {
        match self {
            Self::Added(item) => item.insert(),
            Self::Updated { after, .. } => after.replace(),
            Self::Removed(item) => item.remove(),
        }
    }
}

/// One undo stack entry: a single change or a labelled batch
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub label: Option<String>,
    pub changes: Vec<Change>,
}

#[derive(Debug)]
struct BatchFrame {
    label: String,
    changes: Vec<Change>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    fn step(self, change: &Change) -> Operation {
        match self {
            Self::Undo => change.inverse(),
            Self::Redo => change.forward(),
        }
    }

    fn rollback(self, change: &Change) -> Operation {
        match self {
            Self::Undo => change.forward(),
            Self::Redo => change.inverse(),
        }
    }
}

/// Bounded undo/redo stacks
#[derive(Debug)]
pub struct UndoManager {
    undo: VecDeque<Command>,
    redo: VecDeque<Command>,
    max_size: usize,
    batches: Vec<BatchFrame>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_UNDO_SIZE)
    }
}

impl UndoManager {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max_size: max_size.clamp(1, MAX_UNDO_SIZE),
            batches: Vec::new(),
        }
    }

    /// Record a graph event. Replayed events are ignored.
    pub fn record(&mut self, event: &GraphEvent, origin: Origin) {
        if origin == Origin::Replay {
            return;
        }
        let change = Change::from_event(event);
        if !self.redo.is_empty() {
            tracing::trace!(dropped = self.redo.len(), "new mutation cleared redo stack");
            self.redo.clear();
        }

        match self.batches.last_mut() {
            Some(frame) => frame.changes.push(change),
            None => self.push_undo(Command {
                label: None,
                changes: vec![change],
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batches
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a batch. Batches nest; only the outermost label is kept.
    pub fn begin_batch(&mut self, label: impl Into<String>) {
        let label = label.into();
        tracing::trace!(label = %label, depth = self.batches.len() + 1, "batch opened");
        self.batches.push(BatchFrame {
            label,
            changes: Vec::new(),
        });
    }

    /// Close the innermost batch. Returns `true` when the outermost batch
    /// committed a non-empty command.
    pub fn end_batch(&mut self) -> HistoryResult<bool> {
        let frame = self.batches.pop().ok_or(HistoryError::NoOpenBatch)?;

        if let Some(parent) = self.batches.last_mut() {
            parent.changes.extend(frame.changes);
            return Ok(false);
        }
        if frame.changes.is_empty() {
            tracing::trace!(label = %frame.label, "empty batch discarded");
            return Ok(false);
        }

        tracing::debug!(label = %frame.label, changes = frame.changes.len(), "batch committed");
        self.push_undo(Command {
            label: Some(frame.label),
            changes: frame.changes,
        });
        Ok(true)
    }

    pub fn batch_depth(&self) -> usize {
        self.batches.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Replay
    // ─────────────────────────────────────────────────────────────────────────

    /// Revert the most recent command. Returns the graph events produced, or
    /// `None` when there is nothing to undo.
    pub fn undo(&mut self, graph: &mut Graph) -> HistoryResult<Option<Vec<GraphEvent>>> {
        if !self.batches.is_empty() {
            return Err(HistoryError::BatchOpen("undo"));
        }
        let Some(command) = self.undo.pop_back() else {
            return Ok(None);
        };

        match replay(graph, &command, Direction::Undo) {
            Ok(events) => {
                tracing::debug!(label = ?command.label, changes = command.changes.len(), "undo");
                graph.events_mut().emit(Event::HistoryUndo {
                    label: command.label.clone(),
                    changes: command.changes.len(),
                });
                self.push_redo(command);
                Ok(Some(events))
            }
            Err(err) => {
                self.undo.push_back(command);
                Err(err)
            }
        }
    }

    /// Re-apply the most recently undone command
    pub fn redo(&mut self, graph: &mut Graph) -> HistoryResult<Option<Vec<GraphEvent>>> {
        if !self.batches.is_empty() {
            return Err(HistoryError::BatchOpen("redo"));
        }
        let Some(command) = self.redo.pop_back() else {
            return Ok(None);
        };

        match replay(graph, &command, Direction::Redo) {
            Ok(events) => {
                tracing::debug!(label = ?command.label, changes = command.changes.len(), "redo");
                graph.events_mut().emit(Event::HistoryRedo {
                    label: command.label.clone(),
                    changes: command.changes.len(),
                });
                self.push_undo(command);
                Ok(Some(events))
            }
            Err(err) => {
                self.redo.push_back(command);
                Err(err)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stack management
    // ─────────────────────────────────────────────────────────────────────────

    /// Change the stack bound, evicting the oldest entries if needed
    pub fn set_max_undo_size(&mut self, max_size: usize) -> HistoryResult<()> {
        if max_size == 0 || max_size > MAX_UNDO_SIZE {
            return Err(HistoryError::Config(format!(
                "max_undo_size must be between 1 and {MAX_UNDO_SIZE}, got {max_size}"
            )));
        }
        self.max_size = max_size;
        trim(&mut self.undo, max_size);
        trim(&mut self.redo, max_size);
        Ok(())
    }

    pub fn max_undo_size(&self) -> usize {
        self.max_size
    }

    /// Drop both stacks and emit `history.cleared`
    pub fn clear(&mut self, events: &mut EventBus) {
        self.undo.clear();
        self.redo.clear();
        tracing::debug!("history cleared");
        events.emit(Event::HistoryCleared);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().and_then(|c| c.label.as_deref())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.back().and_then(|c| c.label.as_deref())
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Undo stack, oldest first
    pub fn undo_stack(&self) -> impl Iterator<Item = &Command> {
        self.undo.iter()
    }

    fn push_undo(&mut self, command: Command) {
        self.undo.push_back(command);
        trim(&mut self.undo, self.max_size);
    }

    fn push_redo(&mut self, command: Command) {
        self.redo.push_back(command);
        trim(&mut self.redo, self.max_size);
    }
}

fn trim(stack: &mut VecDeque<Command>, max_size: usize) {
    while stack.len() > max_size {
        stack.pop_front();
    }
}

/// Apply every change of a command in replay order. Subscribers only hear
/// about the steps once all of them succeed; on failure the steps already
/// applied are rolled back silently before the error is returned.
fn replay(graph: &mut Graph, command: &Command, direction: Direction) -> HistoryResult<Vec<GraphEvent>> {
    let ordered: Vec<&Change> = match direction {
        Direction::Undo => command.changes.iter().rev().collect(),
        Direction::Redo => command.changes.iter().collect(),
    };

    let mut events = Vec::with_capacity(ordered.len());
    for (step, change) in ordered.iter().enumerate() {
        match graph.apply_deferred(direction.step(change)) {
            Ok(event) => events.push(event),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    id = change.id(),
                    step,
                    "replay failed, rolling back"
                );
                for applied in ordered[..step].iter().rev() {
                    if let Err(rollback_err) = graph.apply_deferred(direction.rollback(applied)) {
                        tracing::warn!(error = %rollback_err, id = applied.id(), "rollback step failed");
                    }
                }
                return Err(err.into());
            }
        }
    }
    graph.publish_all(events.iter().cloned());
    Ok(events)
}
