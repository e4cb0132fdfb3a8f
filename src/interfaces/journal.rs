//! Journal backend interface.

use async_trait::async_trait;

use super::document_store::StoreError;
use crate::lifecycle::BackendState;
use crate::persistent::{AtomicWrite, PersistentRepr};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Errors surfaced by the journal and snapshot backends.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Backend not initialized (state: {state})")]
    NotInitialized { state: BackendState },

    #[error("Backend already started (state: {state})")]
    AlreadyStarted { state: BackendState },

    #[error("Connection failed: {0}")]
    ConnectionFailure(#[source] StoreError),

    #[error("Write failed for persistence id '{persistence_id}'")]
    WriteGroup {
        persistence_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Query failed: {0}")]
    Query(#[from] StoreError),

    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    #[error("Stored document '{key}' could not be decoded: {reason}")]
    Decode { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Interface the host runtime calls to persist and recover events.
///
/// Implementations:
/// - `Journal`: backed by any `DocumentStore`
#[async_trait]
pub trait JournalBackend: Send + Sync {
    /// Persist a batch of atomic write groups.
    ///
    /// Returns one slot per group, in input order. A failed group does not
    /// roll back its siblings. The outer error is reserved for failures that
    /// affect the whole batch (backend not ready, high-water mark update).
    async fn write_messages(&self, writes: Vec<AtomicWrite>) -> Result<Vec<Result<()>>>;

    /// Deliver events in `[from, to]` for the identity, ascending, at most `max`.
    ///
    /// `max == 0` issues no query and never calls `emit`.
    async fn replay_messages(
        &self,
        persistence_id: &str,
        from: i64,
        to: i64,
        max: u64,
        emit: &mut (dyn FnMut(PersistentRepr) + Send),
    ) -> Result<()>;

    /// Highest sequence number stored for the identity, or 0 when none.
    ///
    /// `from` is a hint only.
    async fn read_highest_sequence_nr(&self, persistence_id: &str, from: i64) -> Result<i64>;

    /// Permanently remove entries with sequence number <= `to`.
    ///
    /// `to == i64::MAX` removes every entry for the identity.
    async fn delete_messages_to(&self, persistence_id: &str, to: i64) -> Result<()>;
}
