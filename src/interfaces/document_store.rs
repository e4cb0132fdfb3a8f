//! Document store port.
//!
//! The backing store is treated as a capability: key-value
//! upsert/get/insert/replace/remove plus a parameterized, indexed query
//! interface with ordering and limit. Journal and snapshot backends only talk
//! to the store through this trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::storage::query::{DeleteQuery, SelectQuery};

/// Result type for document store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("CAS mismatch for document '{key}'")]
    CasMismatch { key: String },

    #[error("Document already exists: '{key}'")]
    AlreadyExists { key: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    ///
    /// Only connection-level and availability failures qualify. CAS and
    /// existence conflicts are resolved by the caller re-reading state.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Unavailable(_))
    }
}

/// Compare-and-swap token returned by every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cas(pub u64);

/// A document together with its current CAS token.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub content: Value,
    pub cas: Cas,
}

/// Interface for a bucket (or collection within a bucket) of JSON documents.
///
/// Implementations:
/// - `MemoryStore`: in-process store for tests and standalone use
///
/// Query results may be eventually consistent with respect to key-value
/// mutations; callers must tolerate a write not yet being visible to an
/// immediately following query.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the bucket this store addresses. Used as the query keyspace.
    fn bucket(&self) -> &str;

    /// Insert or overwrite the document at `key`.
    async fn upsert(&self, key: &str, document: Value) -> StoreResult<Cas>;

    /// Insert the document only if `key` is absent.
    ///
    /// Fails with `StoreError::AlreadyExists` otherwise.
    async fn insert(&self, key: &str, document: Value) -> StoreResult<Cas>;

    /// Replace the document at `key` only if its CAS still equals `cas`.
    ///
    /// Fails with `StoreError::CasMismatch` if the document changed or vanished.
    async fn replace(&self, key: &str, document: Value, cas: Cas) -> StoreResult<Cas>;

    /// Fetch the document at `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredDocument>>;

    /// Remove the document at `key`. Returns whether a document was removed.
    async fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Run a select query, returning matching documents in query order.
    async fn query(&self, query: &SelectQuery) -> StoreResult<Vec<Value>>;

    /// Run a delete query, returning the number of removed documents.
    async fn delete_where(&self, query: &DeleteQuery) -> StoreResult<u64>;
}

/// Where and how to reach one bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub connection_string: String,
    pub username: String,
    pub password: String,
    pub bucket: String,
    pub collection: Option<String>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Opens document stores. The only place backends touch connection details.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> StoreResult<Arc<dyn DocumentStore>>;
}
