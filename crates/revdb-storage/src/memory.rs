//! In-memory storage backend

use crate::{decode, encode, matches_pattern, Storage, StorageError, StorageStats};
use async_trait::async_trait;
use dashmap::DashMap;
use revdb_core::{DocumentId, Revision, RevisionId};
use std::sync::atomic::{AtomicUsize, Ordering};

struct StoredRevision {
    id: RevisionId,
    data: Vec<u8>,
}

/// In-memory storage backend
///
/// Fast, volatile storage suitable for development and caching.
/// Data is lost when the process exits.
pub struct MemoryStorage {
    /// Encoded revisions per document, in append order
    data: DashMap<DocumentId, Vec<StoredRevision>>,
    /// Total size tracking
    total_size: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            total_size: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn rewrite_raw(&self, id: &DocumentId, f: impl Fn(&str) -> String) {
        if let Some(mut entry) = self.data.get_mut(id) {
            for stored in entry.value_mut().iter_mut() {
                let text = String::from_utf8_lossy(&stored.data).to_string();
                stored.data = f(&text).into_bytes();
            }
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn append_revision(&self, revision: &Revision) -> Result<bool, StorageError> {
        let data = encode(revision)?;

        let mut entry = self.data.entry(revision.document_id().clone()).or_default();
        if entry.iter().any(|stored| &stored.id == revision.id()) {
            return Ok(false);
        }

        self.total_size.fetch_add(data.len(), Ordering::Relaxed);
        entry.push(StoredRevision {
            id: revision.id().clone(),
            data,
        });
        Ok(true)
    }

    async fn load_revisions(&self, id: &DocumentId) -> Result<Vec<Revision>, StorageError> {
        match self.data.get(id) {
            Some(entry) => entry.value().iter().map(|stored| decode(&stored.data)).collect(),
            None => Ok(Vec::new()),
        }
    }

    async fn purge(&self, id: &DocumentId) -> Result<bool, StorageError> {
        match self.data.remove(id) {
            Some((_, revisions)) => {
                let size: usize = revisions.iter().map(|stored| stored.data.len()).sum();
                self.total_size.fetch_sub(size, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, pattern: Option<&str>) -> Result<Vec<DocumentId>, StorageError> {
        let mut ids: Vec<DocumentId> = self
            .data
            .iter()
            .filter(|entry| pattern.map_or(true, |p| matches_pattern(entry.key().as_str(), p)))
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, id: &DocumentId) -> Result<bool, StorageError> {
        Ok(self.data.contains_key(id))
    }

    async fn stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            document_count: self.data.len(),
            revision_count: self.data.iter().map(|entry| entry.value().len()).sum(),
            total_size_bytes: self.total_size.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revdb_core::{Document, Properties, Value};

    fn document_with_revisions(id: &str, count: i64) -> Document {
        let doc = Document::new(DocumentId::new(id).unwrap());
        let mut parent = None;
        for n in 0..count {
            let mut props = Properties::new();
            props.insert("n".into(), Value::from(n));
            let rev = doc.put(props, parent.as_ref()).unwrap();
            parent = Some(rev.id().clone());
        }
        doc
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let storage = MemoryStorage::new();
        let doc = document_with_revisions("test:1", 3);

        for rev in doc.revisions() {
            assert!(storage.append_revision(&rev).await.unwrap());
        }

        let loaded = storage.load_revisions(doc.id()).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].id(), doc.current_revision().unwrap().id());
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let storage = MemoryStorage::new();
        let doc = document_with_revisions("test:2", 1);
        let rev = doc.current_revision().unwrap();

        assert!(storage.append_revision(&rev).await.unwrap());
        assert!(!storage.append_revision(&rev).await.unwrap());
        assert_eq!(storage.stats().await.unwrap().revision_count, 1);
    }

    #[tokio::test]
    async fn test_purge() {
        let storage = MemoryStorage::new();
        let doc = document_with_revisions("test:3", 2);
        for rev in doc.revisions() {
            storage.append_revision(&rev).await.unwrap();
        }

        assert!(storage.exists(doc.id()).await.unwrap());
        assert!(storage.purge(doc.id()).await.unwrap());
        assert!(!storage.exists(doc.id()).await.unwrap());
        assert!(!storage.purge(doc.id()).await.unwrap());
        assert_eq!(storage.stats().await.unwrap().total_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_list_with_pattern() {
        let storage = MemoryStorage::new();

        for i in 0..5 {
            let doc = document_with_revisions(&format!("user:{}", i), 1);
            storage.append_revision(&doc.current_revision().unwrap()).await.unwrap();
        }

        for i in 0..3 {
            let doc = document_with_revisions(&format!("cart:{}", i), 1);
            storage.append_revision(&doc.current_revision().unwrap()).await.unwrap();
        }

        assert_eq!(storage.list(Some("user:*")).await.unwrap().len(), 5);
        assert_eq!(storage.list(Some("cart:*")).await.unwrap().len(), 3);
        assert_eq!(storage.list(None).await.unwrap().len(), 8);
    }
}
