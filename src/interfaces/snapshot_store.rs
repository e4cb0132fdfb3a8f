//! Snapshot backend interface.

use async_trait::async_trait;
use bytes::Bytes;

use super::journal::Result;
use crate::persistent::{SelectedSnapshot, SnapshotMetadata, SnapshotSelectionCriteria};

/// Interface for snapshot persistence.
///
/// Snapshots are an optimization to avoid replaying an entire journal. Several
/// snapshots may exist per identity; selection returns at most one.
///
/// Implementations:
/// - `SnapshotStore`: backed by any `DocumentStore`
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Store a snapshot. Saving the same (identity, sequence) again overwrites it.
    async fn save(&self, metadata: &SnapshotMetadata, snapshot: Bytes) -> Result<()>;

    /// Newest snapshot (by sequence number) satisfying `criteria`.
    ///
    /// Returns `None` if nothing matches.
    async fn load_latest(
        &self,
        persistence_id: &str,
        criteria: SnapshotSelectionCriteria,
    ) -> Result<Option<SelectedSnapshot>>;

    /// Delete the snapshot stored at exactly this sequence number.
    async fn delete_one(&self, persistence_id: &str, sequence_nr: i64) -> Result<()>;

    /// Delete every snapshot for the identity satisfying `criteria`.
    async fn delete_matching(
        &self,
        persistence_id: &str,
        criteria: SnapshotSelectionCriteria,
    ) -> Result<()>;
}
