//! Documents and their read/write/delete/purge operations
//!
//! A [`Document`] owns one [`RevisionTree`] behind a read-write lock. Every
//! mutation is a read-modify-write of (current revision, tree insertion,
//! winner recomputation) under the write lock, so two writers racing on the
//! same expected parent can never both succeed. Readers take the shared lock
//! and always see a fully inserted revision.

use crate::error::{Error, Result};
use crate::revision::{validate_properties, Properties, Revision, RevisionId, RESERVED_PREFIX};
use crate::store::{ChangeKind, DocumentChange, Registry};
use crate::tree::RevisionTree;
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Maximum document size in bytes (16MB default)
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Maximum nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum identifier length in bytes
const MAX_ID_LEN: usize = 512;

/// Per-document content limits checked on every write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_document_size: usize,
    pub max_nesting_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_size: MAX_DOCUMENT_SIZE,
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// Document identifier - non-empty UTF-8 string, max 512 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new document ID, validating the format
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::Validation("Document ID cannot be empty".into()));
        }

        if id.len() > MAX_ID_LEN {
            return Err(Error::Validation("Document ID exceeds 512 bytes".into()));
        }

        if id.starts_with(RESERVED_PREFIX) {
            return Err(Error::Validation(format!(
                "Document ID cannot start with '{}'",
                RESERVED_PREFIX
            )));
        }

        if id.chars().any(char::is_control) {
            return Err(Error::Validation(
                "Document ID cannot contain control characters".into(),
            ));
        }

        Ok(Self(id))
    }

    /// Fresh random identifier (UUID v4)
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Lifecycle state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// No revisions yet
    New,
    /// Current revision is live
    Active,
    /// Current revision is a tombstone
    Deleted,
    /// History discarded; the document is gone
    Purged,
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentState::New => write!(f, "new"),
            DocumentState::Active => write!(f, "active"),
            DocumentState::Deleted => write!(f, "deleted"),
            DocumentState::Purged => write!(f, "purged"),
        }
    }
}

struct DocumentInner {
    tree: RevisionTree,
    purged: bool,
    next_sequence: u64,
}

impl DocumentInner {
    fn ensure_live(&self, id: &DocumentId) -> Result<()> {
        if self.purged {
            return Err(Error::NotFound(format!("Document {} was purged", id)));
        }
        Ok(())
    }

    fn insert(&mut self, revision: Revision) -> Result<Arc<Revision>> {
        let revision = self.tree.insert(revision)?;
        self.next_sequence += 1;
        Ok(revision)
    }
}

/// A revision-tracked document
pub struct Document {
    id: DocumentId,
    limits: Limits,
    inner: RwLock<DocumentInner>,
    /// Owning store, if any; used for change events and forgetting on purge
    registry: Weak<Registry>,
}

impl Document {
    /// Create a standalone document not attached to any store
    pub fn new(id: DocumentId) -> Self {
        Self::attached(id, Limits::default(), Weak::new())
    }

    pub(crate) fn attached(id: DocumentId, limits: Limits, registry: Weak<Registry>) -> Self {
        Self {
            id,
            limits,
            inner: RwLock::new(DocumentInner {
                tree: RevisionTree::new(),
                purged: false,
                next_sequence: 1,
            }),
            registry,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn state(&self) -> DocumentState {
        let inner = self.inner.read();
        if inner.purged {
            return DocumentState::Purged;
        }
        match inner.tree.current() {
            None => DocumentState::New,
            Some(rev) if rev.is_deleted() => DocumentState::Deleted,
            Some(_) => DocumentState::Active,
        }
    }

    /// True when the current revision is a tombstone
    pub fn is_deleted(&self) -> bool {
        self.state() == DocumentState::Deleted
    }

    pub fn current_revision(&self) -> Option<Arc<Revision>> {
        self.inner.read().tree.current().cloned()
    }

    pub fn current_revision_id(&self) -> Option<RevisionId> {
        self.inner.read().tree.current_id().cloned()
    }

    /// Point lookup of any revision in this document's tree
    pub fn revision(&self, id: &RevisionId) -> Option<Arc<Revision>> {
        self.inner.read().tree.get(id).cloned()
    }

    /// Chain from the root to the current revision, root first
    pub fn revision_history(&self) -> Vec<Arc<Revision>> {
        let inner = self.inner.read();
        match inner.tree.current_id() {
            Some(current) => inner.tree.history(current),
            None => Vec::new(),
        }
    }

    /// Every leaf of the tree, winner first
    pub fn leaf_revisions(&self) -> Vec<Arc<Revision>> {
        self.inner.read().tree.leaves()
    }

    /// Leaves that lost to the current revision
    pub fn conflicting_revisions(&self) -> Vec<Arc<Revision>> {
        self.inner.read().tree.conflicts()
    }

    pub fn has_conflicts(&self) -> bool {
        self.inner.read().tree.has_conflicts()
    }

    /// Every stored revision in insertion order
    pub fn revisions(&self) -> Vec<Arc<Revision>> {
        self.inner.read().tree.revisions()
    }

    /// Current properties including `_id`, `_rev` and `_deleted`
    pub fn properties(&self) -> Option<Properties> {
        self.current_revision().map(|rev| rev.properties_with_metadata())
    }

    /// Current properties without reserved metadata keys
    pub fn user_properties(&self) -> Option<Properties> {
        self.current_revision().map(|rev| rev.properties().clone())
    }

    /// Read one property of the current revision
    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner
            .read()
            .tree
            .current()
            .and_then(|rev| rev.property(key).cloned())
    }

    /// Read a nested property of the current revision, e.g. `"address.city"`
    /// or `"tags[0]"`. A top-level key that matches `path` exactly wins.
    pub fn property_path(&self, path: &str) -> Option<Value> {
        let inner = self.inner.read();
        let current = inner.tree.current()?;
        if let Some(value) = current.property(path) {
            return Some(value.clone());
        }

        let split = path.find(|c| c == '.' || c == '[').unwrap_or(path.len());
        let (key, rest) = path.split_at(split);
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        current.property(key)?.get_path(rest).cloned()
    }

    /// Start a new revision seeded from the current one
    pub fn create_revision(&self) -> RevisionBuilder<'_> {
        let inner = self.inner.read();
        let current = inner.tree.current();
        RevisionBuilder {
            document: self,
            parent: current.map(|rev| rev.id().clone()),
            properties: current.map(|rev| rev.properties().clone()).unwrap_or_default(),
            deleted: false,
        }
    }

    /// Write a new revision on top of `expected_parent`.
    ///
    /// Fails with [`Error::Conflict`] unless `expected_parent` is exactly the
    /// current revision ID (`None` for a document with no revisions).
    pub fn put(
        &self,
        properties: Properties,
        expected_parent: Option<&RevisionId>,
    ) -> Result<Arc<Revision>> {
        self.commit(properties, expected_parent, false)
    }

    /// Write a tombstone on top of the current revision
    pub fn delete(&self) -> Result<Arc<Revision>> {
        let properties = Properties::new();
        let content = validate_properties(&properties, &self.limits)?;

        let (revision, in_conflict) = {
            let mut inner = self.inner.write();
            inner.ensure_live(&self.id)?;

            let parent = match inner.tree.current() {
                None => return Err(Error::NotFound(format!("Document {}", self.id))),
                Some(rev) if rev.is_deleted() => {
                    return Err(Error::NotFound(format!("Document {} is deleted", self.id)))
                }
                Some(rev) => rev.id().clone(),
            };

            let id = RevisionId::derive(Some(&parent), true, &content);
            let revision = Revision::new(
                id,
                Some(parent),
                self.id.clone(),
                properties,
                true,
                inner.next_sequence,
            );
            let revision = inner.insert(revision)?;
            (revision, inner.tree.has_conflicts())
        };

        debug!(doc = %self.id, rev = %revision.id(), "Document deleted");
        self.notify(ChangeKind::Deleted, Some(revision.id().clone()), in_conflict);
        Ok(revision)
    }

    /// Discard the whole revision tree and drop this document from its store
    pub fn purge(&self) -> Result<()> {
        let removed = {
            let mut inner = self.inner.write();
            inner.ensure_live(&self.id)?;
            let removed = inner.tree.len();
            inner.tree.clear();
            inner.purged = true;
            removed
        };

        debug!(doc = %self.id, revisions = removed, "Document purged");

        if let Some(registry) = self.registry.upgrade() {
            registry.forget(self);
            registry.publish(DocumentChange {
                document_id: self.id.clone(),
                revision_id: None,
                kind: ChangeKind::Purged,
                in_conflict: false,
            });
        }
        Ok(())
    }

    /// Insert a revision under an arbitrary existing parent without the
    /// current-revision check, or as a new root when `parent` is `None`.
    ///
    /// This is how branches enter the tree, e.g. from a replicator.
    pub fn force_insert(
        &self,
        properties: Properties,
        parent: Option<&RevisionId>,
        deleted: bool,
    ) -> Result<Arc<Revision>> {
        let content = validate_properties(&properties, &self.limits)?;
        let id = RevisionId::derive(parent, deleted, &content);

        let (revision, in_conflict) = {
            let mut inner = self.inner.write();
            inner.ensure_live(&self.id)?;

            if let Some(existing) = inner.tree.get(&id) {
                return Ok(existing.clone());
            }

            let revision = Revision::new(
                id,
                parent.cloned(),
                self.id.clone(),
                properties,
                deleted,
                inner.next_sequence,
            );
            let revision = inner.insert(revision)?;
            (revision, inner.tree.has_conflicts())
        };

        debug!(doc = %self.id, rev = %revision.id(), in_conflict, "Revision force-inserted");
        self.notify(change_kind(deleted), Some(revision.id().clone()), in_conflict);
        Ok(revision)
    }

    /// Re-insert a previously stored revision, checking it belongs to this
    /// document and that its ID matches its content
    pub fn restore_revision(&self, revision: &Revision) -> Result<Arc<Revision>> {
        if revision.document_id() != &self.id {
            return Err(Error::Validation(format!(
                "Revision {} belongs to {}, not {}",
                revision.id(),
                revision.document_id(),
                self.id
            )));
        }
        revision.verify()?;

        let mut inner = self.inner.write();
        inner.ensure_live(&self.id)?;

        if let Some(existing) = inner.tree.get(revision.id()) {
            return Ok(existing.clone());
        }

        let restored = Revision::new(
            revision.id().clone(),
            revision.parent_id().cloned(),
            self.id.clone(),
            revision.properties().clone(),
            revision.is_deleted(),
            inner.next_sequence,
        );
        inner.insert(restored)
    }

    fn commit(
        &self,
        properties: Properties,
        expected_parent: Option<&RevisionId>,
        deleted: bool,
    ) -> Result<Arc<Revision>> {
        let content = validate_properties(&properties, &self.limits)?;
        let id = RevisionId::derive(expected_parent, deleted, &content);

        let (revision, in_conflict) = {
            let mut inner = self.inner.write();
            inner.ensure_live(&self.id)?;

            let actual = inner.tree.current_id();
            if actual != expected_parent {
                debug!(
                    doc = %self.id,
                    expected = ?expected_parent.map(|r| r.to_string()),
                    actual = ?actual.map(|r| r.to_string()),
                    "Revision conflict"
                );
                return Err(Error::Conflict {
                    document: self.id.to_string(),
                    expected: expected_parent.cloned(),
                    actual: actual.cloned(),
                });
            }

            let revision = Revision::new(
                id,
                expected_parent.cloned(),
                self.id.clone(),
                properties,
                deleted,
                inner.next_sequence,
            );
            let revision = inner.insert(revision)?;
            (revision, inner.tree.has_conflicts())
        };

        debug!(
            doc = %self.id,
            rev = %revision.id(),
            deleted,
            "Revision saved"
        );
        self.notify(change_kind(deleted), Some(revision.id().clone()), in_conflict);
        Ok(revision)
    }

    fn notify(&self, kind: ChangeKind, revision_id: Option<RevisionId>, in_conflict: bool) {
        if let Some(registry) = self.registry.upgrade() {
            registry.publish(DocumentChange {
                document_id: self.id.clone(),
                revision_id,
                kind,
                in_conflict,
            });
        }
    }
}

fn change_kind(deleted: bool) -> ChangeKind {
    if deleted {
        ChangeKind::Deleted
    } else {
        ChangeKind::Updated
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("purged", &inner.purged)
            .field("tree", &inner.tree)
            .finish()
    }
}

/// Unsaved revision of a document.
///
/// Captures the document's current revision ID when created; [`save`]
/// succeeds only if that is still the current revision.
///
/// [`save`]: RevisionBuilder::save
pub struct RevisionBuilder<'a> {
    document: &'a Document,
    parent: Option<RevisionId>,
    properties: Properties,
    deleted: bool,
}

impl<'a> RevisionBuilder<'a> {
    pub fn parent_id(&self) -> Option<&RevisionId> {
        self.parent.as_ref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn set_properties(&mut self, properties: Properties) -> &mut Self {
        self.properties = properties;
        self
    }

    /// Mark this revision as a tombstone; its properties are dropped on save
    pub fn set_deleted(&mut self, deleted: bool) -> &mut Self {
        self.deleted = deleted;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn save(self) -> Result<Arc<Revision>> {
        let properties = if self.deleted {
            Properties::new()
        } else {
            self.properties
        };
        self.document
            .commit(properties, self.parent.as_ref(), self.deleted)
    }
}
