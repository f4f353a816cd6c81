//! revdb Storage Backends
//!
//! Persistence is a collaborator of the core, not part of it. This crate
//! defines the boundary and two backends:
//! - Memory (default): Fast, volatile storage
//! - SQLite: Embedded persistence
//!
//! Revisions cross the boundary as JSON-encoded [`Revision`] values. Loading
//! goes back through [`Document::restore_revision`], so a stored revision
//! whose ID no longer matches its content is rejected rather than trusted.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use revdb_core::{Document, DocumentId, DocumentStore, Error, Revision};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage backend trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// Append a revision; returns false if it was already stored
    async fn append_revision(&self, revision: &Revision) -> Result<bool, StorageError>;

    /// Load every stored revision of a document, in the order they were appended
    async fn load_revisions(&self, id: &DocumentId) -> Result<Vec<Revision>, StorageError>;

    /// Drop every revision of a document
    async fn purge(&self, id: &DocumentId) -> Result<bool, StorageError>;

    /// List document IDs matching a pattern
    async fn list(&self, pattern: Option<&str>) -> Result<Vec<DocumentId>, StorageError>;

    /// Check if a document has any stored revisions
    async fn exists(&self, id: &DocumentId) -> Result<bool, StorageError>;

    /// Get storage statistics
    async fn stats(&self) -> Result<StorageStats, StorageError>;
}

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt revision data: {0}")]
    Corrupt(String),
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::store(e)
    }
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub document_count: usize,
    pub revision_count: usize,
    pub total_size_bytes: usize,
}

/// Write every revision of `doc` that the backend does not have yet.
///
/// Returns the number of newly stored revisions.
pub async fn save_document<S>(storage: &S, doc: &Document) -> revdb_core::Result<usize>
where
    S: Storage + ?Sized,
{
    let mut written = 0;
    for revision in doc.revisions() {
        if storage.append_revision(&revision).await? {
            written += 1;
        }
    }

    debug!(doc = %doc.id(), written, "Document saved");
    Ok(written)
}

/// Rebuild a document in `store` from its stored revisions.
///
/// Returns `None` when the backend has nothing for `id`.
pub async fn load_document<S>(
    store: &DocumentStore,
    storage: &S,
    id: &DocumentId,
) -> revdb_core::Result<Option<Arc<Document>>>
where
    S: Storage + ?Sized,
{
    let mut revisions = storage.load_revisions(id).await?;
    if revisions.is_empty() {
        return Ok(None);
    }

    // parents before children; stable so append order breaks ties
    revisions.sort_by_key(Revision::generation);

    let doc = store.get_or_create(id);
    for revision in &revisions {
        if let Err(e) = doc.restore_revision(revision) {
            warn!(doc = %id, rev = %revision.id(), error = %e, "Rejecting stored revision");
            store.forget(&doc);
            return Err(StorageError::Corrupt(format!("{}: {}", revision.id(), e)).into());
        }
    }

    debug!(doc = %id, revisions = revisions.len(), "Document loaded");
    Ok(Some(doc))
}

/// Purge `doc` and drop its stored history
pub async fn purge_document<S>(storage: &S, doc: &Document) -> revdb_core::Result<()>
where
    S: Storage + ?Sized,
{
    doc.purge()?;
    storage.purge(doc.id()).await?;
    Ok(())
}

pub(crate) fn encode(revision: &Revision) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(revision).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Revision, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Corrupt(e.to_string()))
}

/// Simple glob pattern matching
pub(crate) fn matches_pattern(key: &str, pattern: &str) -> bool {
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

pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
