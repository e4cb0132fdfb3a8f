//! Abstract interfaces for docjournal components.
//!
//! These traits define the contracts for:
//! - The backing document store (port)
//! - Event journal (write, replay, highest sequence, delete)
//! - Snapshot storage

pub mod document_store;
pub mod journal;
pub mod snapshot_store;

pub use document_store::{
    Cas, DocumentStore, Endpoint, StoreConnector, StoreError, StoreResult, StoredDocument,
};
pub use journal::{JournalBackend, PersistenceError, Result};
pub use snapshot_store::SnapshotBackend;
