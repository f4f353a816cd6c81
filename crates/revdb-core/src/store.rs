//! Document store - identity cache and change feed

use crate::document::{Document, DocumentId, DocumentState, Limits};
use crate::revision::RevisionId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the change feed before slow receivers start lagging
const CHANGE_CHANNEL_CAPACITY: usize = 10000;

/// What happened to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A live revision was added
    Updated,
    /// A tombstone was added
    Deleted,
    /// All history was discarded
    Purged,
}

/// Change notification published after every successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub document_id: DocumentId,
    /// New revision, `None` for purges
    pub revision_id: Option<RevisionId>,
    pub kind: ChangeKind,
    /// Whether the document has more than one leaf after the change
    pub in_conflict: bool,
}

/// Shared state between a store and the documents it hands out
pub(crate) struct Registry {
    documents: DashMap<DocumentId, Arc<Document>>,
    changes: broadcast::Sender<DocumentChange>,
    limits: Limits,
}

impl Registry {
    /// Remove `doc` from the cache if it is the cached instance
    pub(crate) fn forget(&self, doc: &Document) {
        let removed = self
            .documents
            .remove_if(doc.id(), |_, cached| std::ptr::eq(Arc::as_ptr(cached), doc));
        if removed.is_some() {
            trace!(doc = %doc.id(), "Document forgotten");
        }
    }

    pub(crate) fn publish(&self, change: DocumentChange) {
        let _ = self.changes.send(change);
    }
}

/// Registry mapping identifiers to documents.
///
/// Repeated lookups of one identifier return the same [`Document`] instance
/// until it is forgotten or purged.
pub struct DocumentStore {
    registry: Arc<Registry>,
}

impl DocumentStore {
    /// Create a new document store
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            registry: Arc::new(Registry {
                documents: DashMap::new(),
                changes,
                limits,
            }),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.registry.limits
    }

    /// Get the cached document for `id`, creating an empty one if absent.
    ///
    /// A cached instance that was purged but not yet forgotten is replaced,
    /// so callers never receive a purged document from this lookup.
    pub fn get_or_create(&self, id: &DocumentId) -> Arc<Document> {
        loop {
            let doc = match self.get(id) {
                Some(doc) => {
                    trace!(doc = %id, "Document cache hit");
                    doc
                }
                None => self
                    .registry
                    .documents
                    .entry(id.clone())
                    .or_insert_with(|| {
                        trace!(doc = %id, "Document cache miss");
                        Arc::new(Document::attached(
                            id.clone(),
                            self.registry.limits,
                            Arc::downgrade(&self.registry),
                        ))
                    })
                    .value()
                    .clone(),
            };

            // map guards are released here; the state read takes the document lock
            if doc.state() != DocumentState::Purged {
                return doc;
            }
            self.registry.forget(&doc);
        }
    }

    /// Get a cached document without creating one
    pub fn get(&self, id: &DocumentId) -> Option<Arc<Document>> {
        self.registry.documents.get(id).map(|r| r.value().clone())
    }

    /// Create a document under a freshly generated identifier
    pub fn create_document(&self) -> Arc<Document> {
        loop {
            let id = DocumentId::generate();
            if !self.contains(&id) {
                return self.get_or_create(&id);
            }
        }
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.registry.documents.contains_key(id)
    }

    /// Drop `doc` from the cache so the next lookup builds fresh state.
    ///
    /// Does nothing if `doc` is not the instance currently cached.
    pub fn forget(&self, doc: &Document) {
        self.registry.forget(doc);
    }

    /// List cached document IDs matching a pattern (glob syntax), sorted
    pub fn list(&self, pattern: Option<&str>) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self
            .registry
            .documents
            .iter()
            .filter(|entry| {
                pattern.map_or(true, |p| Self::matches_pattern(entry.key().as_str(), p))
            })
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.registry.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.documents.is_empty()
    }

    /// Subscribe to document changes
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.registry.changes.subscribe()
    }

    /// Get statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            document_count: self.registry.documents.len(),
            subscriber_count: self.registry.changes.receiver_count(),
        }
    }

    /// Simple glob pattern matching
    fn matches_pattern(key: &str, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }

        if let Some(prefix) = pattern.strip_suffix('*') {
            return key.starts_with(prefix);
        }

        if let Some(suffix) = pattern.strip_prefix('*') {
            return key.ends_with(suffix);
        }

        key == pattern
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("documents", &self.registry.documents.len())
            .field("limits", &self.registry.limits)
            .finish()
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub document_count: usize,
    pub subscriber_count: usize,
}
