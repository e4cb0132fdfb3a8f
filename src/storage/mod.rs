//! Storage layer: document layouts, query builder, in-memory store, and
//! backend construction.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PersistenceConfig;
use crate::interfaces::{Result, StoreConnector};
use crate::journal::Journal;
use crate::snapshot::SnapshotStore;

pub mod memory;
pub mod query;
pub mod schema;

pub use memory::{MemoryCluster, MemoryStore};

/// Build and start both backends from configuration.
///
/// Returns the started (Journal, SnapshotStore) pair. Either one failing to
/// start fails the whole call.
pub async fn init_backends(
    config: &PersistenceConfig,
    connector: &dyn StoreConnector,
) -> Result<(Arc<Journal>, Arc<SnapshotStore>)> {
    let journal_endpoint = config.journal.journal_endpoint()?;
    let snapshot_endpoint = config.snapshot.snapshot_endpoint()?;
    info!(
        journal_bucket = %journal_endpoint.bucket,
        snapshot_bucket = %snapshot_endpoint.bucket,
        "Initializing persistence backends"
    );
    if journal_endpoint.bucket == snapshot_endpoint.bucket
        && journal_endpoint.collection == snapshot_endpoint.collection
    {
        // Journal and snapshot entries share the `{id}_{seq}` key format.
        warn!(
            bucket = %journal_endpoint.bucket,
            "Journal and snapshots share a keyspace; entries with equal keys overwrite each other"
        );
    }

    let journal = Arc::new(Journal::new(config.journal.clone()));
    journal.start(connector).await?;

    let snapshots = Arc::new(SnapshotStore::new(config.snapshot.clone()));
    snapshots.start(connector).await?;

    Ok((journal, snapshots))
}
