//! Snapshot history and branches
//!
//! [`Versioning`] keeps an append-only DAG of immutable [`Version`]s plus
//! named [`Branch`] pointers into it. Two cursors track where the caller is:
//! the current version and the current branch. Operations that fail never
//! move either cursor.
//!
//! Captured snapshots are shared behind `Arc` and only exposed through `&`
//! accessors, so nothing can change a version after it was created.

use crate::error::{HistoryError, HistoryResult};
use chrono::{DateTime, Utc};
use quiver_core::{Diff, DiffEngine, Event, EventBus, Fields, Graph, GraphEvent, Snapshot};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;
use ulid::Ulid;

/// Unique identifier for a version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub String);

impl VersionId {
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for VersionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub String);

impl BranchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable point-in-time capture of the graph
#[derive(Debug, Clone)]
pub struct Version {
    id: VersionId,
    parent_id: Option<VersionId>,
    branch_id: BranchId,
    timestamp: DateTime<Utc>,
    snapshot: Arc<Snapshot>,
    metadata: Arc<Fields>,
}

impl Version {
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// `None` only for the root version
    pub fn parent_id(&self) -> Option<&VersionId> {
        self.parent_id.as_ref()
    }

    pub fn branch_id(&self) -> &BranchId {
        &self.branch_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn metadata(&self) -> &Fields {
        &self.metadata
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A named pointer into the version DAG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    /// Version the branch was created from (`None` for the initial branch)
    pub from_version_id: Option<VersionId>,
    /// Most recent version on the branch
    pub head: Option<VersionId>,
    pub created_at: DateTime<Utc>,
}

/// One entry of the switch log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchRecord {
    pub from: Option<VersionId>,
    pub to: VersionId,
    pub at: DateTime<Utc>,
}

/// Version DAG with branch pointers and dirty tracking
#[derive(Debug)]
pub struct Versioning {
    versions: Vec<Version>,
    version_index: HashMap<VersionId, usize>,
    branches: Vec<Branch>,
    current_version: Option<VersionId>,
    current_branch: BranchId,
    dirty: bool,
    switch_log: Vec<SwitchRecord>,
}

impl Default for Versioning {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BRANCH)
    }
}

impl Versioning {
    /// Create an empty history with one branch whose id and name are `default_branch`
    pub fn new(default_branch: &str) -> Self {
        let id = BranchId::new(default_branch);
        Self {
            versions: Vec::new(),
            version_index: HashMap::new(),
            branches: vec![Branch {
                id: id.clone(),
                name: default_branch.to_string(),
                from_version_id: None,
                head: None,
                created_at: Utc::now(),
            }],
            current_version: None,
            current_branch: id,
            dirty: false,
            switch_log: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Capture the graph as a new version on the current branch
    pub fn create_version(&mut self, graph: &mut Graph, metadata: Fields) -> Version {
        let version = Version {
            id: VersionId::generate(),
            parent_id: self.current_version.clone(),
            branch_id: self.current_branch.clone(),
            timestamp: Utc::now(),
            snapshot: Arc::new(graph.serialize()),
            metadata: Arc::new(metadata),
        };

        self.version_index
            .insert(version.id.clone(), self.versions.len());
        self.versions.push(version.clone());
        if let Some(branch) = self
            .branches
            .iter_mut()
            .find(|b| b.id == self.current_branch)
        {
            branch.head = Some(version.id.clone());
        }
        self.current_version = Some(version.id.clone());
        self.dirty = false;

        tracing::debug!(
            version = %version.id,
            parent = ?version.parent_id,
            branch = %version.branch_id,
            entities = version.snapshot.entities.len(),
            relations = version.snapshot.relations.len(),
            "version created"
        );
        graph.events_mut().emit(Event::VersionCreated {
            version_id: version.id.0.clone(),
            parent_id: version.parent_id.as_ref().map(|p| p.0.clone()),
            branch_id: version.branch_id.0.clone(),
        });
        version
    }

    /// Rebuild the graph from a version's snapshot and move the cursor there
    pub fn switch_to_version(&mut self, graph: &mut Graph, version_id: &str) -> HistoryResult<()> {
        let snapshot = self.get(version_id)?.snapshot.as_ref().clone();
        graph.load(snapshot)?;

        let to = VersionId(version_id.to_string());
        let from = self.current_version.replace(to.clone());
        self.dirty = false;
        self.switch_log.push(SwitchRecord {
            from: from.clone(),
            to: to.clone(),
            at: Utc::now(),
        });

        tracing::debug!(from = ?from, to = %to, "switched version");
        graph.events_mut().emit(Event::VersionSwitched {
            from: from.map(|v| v.0),
            to: to.0,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Branches
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a branch pointing at `from_version_id` (default: the current
    /// version). Cursors do not move.
    pub fn create_branch(
        &mut self,
        name: &str,
        from_version_id: Option<&str>,
        events: &mut EventBus,
    ) -> HistoryResult<Branch> {
        if name.trim().is_empty() {
            return Err(HistoryError::InvalidBranchName(name.to_string()));
        }
        if self.branches.iter().any(|b| b.name == name) {
            return Err(HistoryError::DuplicateBranch(name.to_string()));
        }
        let from = match from_version_id {
            Some(id) => self.get(id)?.id.clone(),
            None => self.current_version.clone().ok_or(HistoryError::NoVersions)?,
        };

        let branch = Branch {
            id: BranchId::generate(),
            name: name.to_string(),
            from_version_id: Some(from.clone()),
            head: Some(from.clone()),
            created_at: Utc::now(),
        };
        self.branches.push(branch.clone());

        tracing::debug!(branch = %branch.id, name, from = %from, "branch created");
        events.emit(Event::BranchCreated {
            branch_id: branch.id.0.clone(),
            name: branch.name.clone(),
            from_version_id: from.0,
        });
        Ok(branch)
    }

    /// Make a branch current and move the version cursor to its head.
    /// The graph itself is not touched.
    pub fn switch_branch(&mut self, branch_id: &str, events: &mut EventBus) -> HistoryResult<()> {
        let branch = self
            .branch(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_id.to_string()))?;
        let to = branch.id.clone();
        let head = branch.head.clone();

        let from = std::mem::replace(&mut self.current_branch, to.clone());
        if head.is_some() {
            self.current_version = head.clone();
        }

        tracing::debug!(from = %from, to = %to, head = ?head, "switched branch");
        events.emit(Event::BranchSwitched {
            from: from.0,
            to: to.0,
            head: head.map(|h| h.0),
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dirty tracking
    // ─────────────────────────────────────────────────────────────────────────

    /// Note a graph mutation. The first one after a snapshot emits `version.dirty`.
    pub fn observe(&mut self, event: &GraphEvent, events: &mut EventBus) {
        if self.dirty {
            return;
        }
        self.dirty = true;
        tracing::trace!(trigger = event.name(), "graph dirty since last version");
        events.emit(Event::VersionDirty {
            since: self.current_version.as_ref().map(|v| v.0.clone()),
        });
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    fn get(&self, version_id: &str) -> HistoryResult<&Version> {
        self.version(version_id)
            .ok_or_else(|| HistoryError::VersionNotFound(version_id.to_string()))
    }

    pub fn version(&self, version_id: &str) -> Option<&Version> {
        self.version_index
            .get(version_id)
            .map(|&i| &self.versions[i])
    }

    /// All versions in creation order
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn root(&self) -> Option<&Version> {
        self.versions.first()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id.as_str() == branch_id)
    }

    pub fn branch_by_name(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn current_version(&self) -> Option<&Version> {
        self.current_version
            .as_ref()
            .and_then(|id| self.version(id.as_str()))
    }

    pub fn current_version_id(&self) -> Option<&VersionId> {
        self.current_version.as_ref()
    }

    pub fn current_branch(&self) -> &BranchId {
        &self.current_branch
    }

    pub fn parent_version(&self, version_id: &str) -> HistoryResult<Option<&Version>> {
        let version = self.get(version_id)?;
        Ok(version
            .parent_id
            .as_ref()
            .and_then(|p| self.version(p.as_str())))
    }

    /// The version followed by its parents up to the root
    pub fn ancestors(&self, version_id: &str) -> HistoryResult<Vec<&Version>> {
        let mut current = self.get(version_id)?;
        let mut chain = vec![current];
        while let Some(parent) = current
            .parent_id
            .as_ref()
            .and_then(|p| self.version(p.as_str()))
        {
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Ancestry of the current version, newest first
    pub fn history(&self) -> Vec<&Version> {
        match &self.current_version {
            Some(id) => self.ancestors(id.as_str()).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Every `switch_to_version` transition, oldest first
    pub fn switch_log(&self) -> &[SwitchRecord] {
        &self.switch_log
    }

    /// Structural diff from one version's snapshot to another's
    pub fn diff_versions(&self, from: &str, to: &str) -> HistoryResult<Diff> {
        let old = self.get(from)?;
        let new = self.get(to)?;
        Ok(DiffEngine::diff(old.snapshot(), new.snapshot())?)
    }
}
