//! revdb Core - revision-tracked documents
//!
//! This crate provides the core functionality for revdb:
//! - Revision trees with deterministic winner selection and conflict sets
//! - Documents with optimistic-concurrency writes, tombstones and purge
//! - A document store that caches one instance per identifier
//! - Structured errors that callers can forward as plain data

pub mod document;
pub mod error;
pub mod revision;
pub mod store;
pub mod tree;
pub mod value;

pub use document::{Document, DocumentId, DocumentState, Limits, RevisionBuilder};
pub use error::{Error, ErrorKind, ErrorReport, Result};
pub use revision::{Properties, Revision, RevisionId};
pub use store::{ChangeKind, DocumentChange, DocumentStore, StoreStats};
pub use tree::RevisionTree;
pub use value::{Number, Value};
