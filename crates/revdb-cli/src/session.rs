//! Command execution against a document store and its backing storage

use std::sync::Arc;

use revdb_core::{
    Document, DocumentId, DocumentState, DocumentStore, Error, Result, Revision, Value,
};
use revdb_storage::{load_document, purge_document, save_document, Storage};
use tracing::debug;

use crate::command::{Command, Parent};

/// Result of executing a command
#[derive(Debug)]
pub enum Reply {
    Revision(Arc<Revision>),
    Revisions(Vec<Arc<Revision>>),
    Value(Value),
    Ids(Vec<DocumentId>),
    Ok(String),
    Info(Vec<(String, String)>),
    Nil,
    Help,
    Quit,
}

/// A store plus the storage it is persisted to
pub struct Session {
    store: DocumentStore,
    storage: Arc<dyn Storage>,
    backend: &'static str,
}

impl Session {
    pub fn new(store: DocumentStore, storage: Arc<dyn Storage>, backend: &'static str) -> Self {
        Self {
            store,
            storage,
            backend,
        }
    }

    /// Execute a single command
    pub async fn execute(&self, command: Command) -> Result<Reply> {
        debug!(?command, "Executing command");

        match command {
            Command::Put {
                id,
                parent,
                properties,
            } => {
                let doc = self.open(&id).await?;
                let expected = match parent {
                    Parent::Current => doc.current_revision_id(),
                    Parent::None => None,
                    Parent::Revision(rev) => Some(rev),
                };
                let revision = doc.put(properties, expected.as_ref())?;
                save_document(&*self.storage, &doc).await?;
                Ok(Reply::Revision(revision))
            }

            Command::Get { id, path } => {
                let Some(doc) = self.find(&id).await? else {
                    return Ok(Reply::Nil);
                };
                if doc.state() != DocumentState::Active {
                    return Ok(Reply::Nil);
                }
                let value = match path {
                    Some(path) => doc.property_path(&path),
                    None => doc.properties().map(Value::Object),
                };
                Ok(value.map_or(Reply::Nil, Reply::Value))
            }

            Command::Revision { id, rev } => {
                let doc = self.existing(&id).await?;
                let revision = doc
                    .revision(&rev)
                    .ok_or_else(|| Error::NotFound(format!("Revision {} of {}", rev, id)))?;
                Ok(Reply::Revision(revision))
            }

            Command::History { id } => {
                let doc = self.existing(&id).await?;
                Ok(Reply::Revisions(doc.revision_history()))
            }

            Command::Leaves { id } => {
                let doc = self.existing(&id).await?;
                Ok(Reply::Revisions(doc.leaf_revisions()))
            }

            Command::Conflicts { id } => {
                let doc = self.existing(&id).await?;
                Ok(Reply::Revisions(doc.conflicting_revisions()))
            }

            Command::Delete { id } => {
                let doc = self.existing(&id).await?;
                let revision = doc.delete()?;
                save_document(&*self.storage, &doc).await?;
                Ok(Reply::Revision(revision))
            }

            Command::Purge { id } => {
                let doc = self.existing(&id).await?;
                purge_document(&*self.storage, &doc).await?;
                Ok(Reply::Ok(format!("purged {}", id)))
            }

            Command::Force {
                id,
                parent,
                deleted,
                properties,
            } => {
                let doc = self.open(&id).await?;
                let parent = match parent {
                    Parent::Current => doc.current_revision_id(),
                    Parent::None => None,
                    Parent::Revision(rev) => Some(rev),
                };
                let revision = doc.force_insert(properties, parent.as_ref(), deleted)?;
                save_document(&*self.storage, &doc).await?;
                Ok(Reply::Revision(revision))
            }

            Command::Keys { pattern } => {
                let mut ids: Vec<DocumentId> = self
                    .store
                    .list(pattern.as_deref())
                    .into_iter()
                    .filter(|id| {
                        self.store
                            .get(id)
                            .is_some_and(|doc| doc.state() != DocumentState::New)
                    })
                    .collect();
                ids.extend(self.storage.list(pattern.as_deref()).await?);
                ids.sort();
                ids.dedup();
                Ok(Reply::Ids(ids))
            }

            Command::Info => {
                let store = self.store.stats();
                let storage = self.storage.stats().await?;
                Ok(Reply::Info(vec![
                    ("version".into(), env!("CARGO_PKG_VERSION").into()),
                    ("backend".into(), self.backend.into()),
                    ("cached_documents".into(), store.document_count.to_string()),
                    ("stored_documents".into(), storage.document_count.to_string()),
                    ("stored_revisions".into(), storage.revision_count.to_string()),
                    ("stored_bytes".into(), storage.total_size_bytes.to_string()),
                    (
                        "max_document_size".into(),
                        self.store.limits().max_document_size.to_string(),
                    ),
                    (
                        "max_nesting_depth".into(),
                        self.store.limits().max_nesting_depth.to_string(),
                    ),
                ]))
            }

            Command::Help => Ok(Reply::Help),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    /// Cached document, else the stored one, else nothing
    async fn find(&self, id: &DocumentId) -> Result<Option<Arc<Document>>> {
        if let Some(doc) = self.store.get(id) {
            return Ok(Some(doc));
        }
        load_document(&self.store, &*self.storage, id).await
    }

    /// Like [`Session::find`] but a missing document is an error
    async fn existing(&self, id: &DocumentId) -> Result<Arc<Document>> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Document {}", id)))
    }

    /// Like [`Session::find`] but creates the document if missing
    async fn open(&self, id: &DocumentId) -> Result<Arc<Document>> {
        match self.find(id).await? {
            Some(doc) => Ok(doc),
            None => Ok(self.store.get_or_create(id)),
        }
    }
}
