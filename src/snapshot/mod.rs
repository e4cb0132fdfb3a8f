//! Snapshot store backed by a `DocumentStore`.
//!
//! Snapshots are `SnapshotEntry` documents keyed by
//! `{persistenceId}_{sequenceNr}`. Several may exist per identity; selection
//! criteria pick the newest one under optional sequence and timestamp bounds.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, info};

use crate::config::SnapshotSettings;
use crate::interfaces::{
    DocumentStore, PersistenceError, Result, SnapshotBackend, StoreConnector,
};
use crate::lifecycle::{BackendState, Lifecycle};
use crate::persistent::{
    SelectedSnapshot, SnapshotMetadata, SnapshotSelectionCriteria,
};
use crate::storage::query::{field, DeleteQuery, Order, Predicate, SelectQuery};
use crate::storage::schema::{
    entry_key, fields, from_document, to_document, SnapshotEntry, SNAPSHOT_ENTRY_TYPE,
};
use crate::utils::bootstrap::connect_with_retry;

/// Snapshot backend.
pub struct SnapshotStore {
    settings: SnapshotSettings,
    lifecycle: Lifecycle<Arc<dyn DocumentStore>>,
}

impl SnapshotStore {
    pub fn new(settings: SnapshotSettings) -> Self {
        Self {
            settings,
            lifecycle: Lifecycle::new(),
        }
    }

    pub async fn state(&self) -> BackendState {
        self.lifecycle.state().await
    }

    /// Connect the snapshot bucket and become ready. A failed start is terminal.
    pub async fn start(&self, connector: &dyn StoreConnector) -> Result<()> {
        self.lifecycle.begin_connect().await?;

        let store = match self.connect(connector).await {
            Ok(store) => store,
            Err(e) => {
                self.lifecycle.fail().await;
                error!(error = %e, "Snapshot store failed to start");
                return Err(e);
            }
        };

        let bucket = store.bucket().to_string();
        match self.lifecycle.ready(store).await {
            BackendState::Ready => {
                info!(bucket = %bucket, "Snapshot store ready");
                Ok(())
            }
            state => Err(PersistenceError::NotInitialized { state }),
        }
    }

    async fn connect(&self, connector: &dyn StoreConnector) -> Result<Arc<dyn DocumentStore>> {
        let endpoint = self.settings.snapshot_endpoint()?;
        connect_with_retry(connector, &endpoint, &self.settings.connect_retry)
            .await
            .map_err(PersistenceError::ConnectionFailure)
    }

    pub async fn close(&self) {
        self.lifecycle.close().await;
        info!("Snapshot store closed");
    }

    /// Delete the snapshot `metadata` identifies.
    ///
    /// When the metadata carries a timestamp, the stored snapshot is only
    /// removed if its timestamp matches.
    #[tracing::instrument(
        name = "snapshot.delete",
        skip_all,
        fields(persistence_id = %metadata.persistence_id, sequence_nr = metadata.sequence_nr)
    )]
    pub async fn delete_snapshot(&self, metadata: &SnapshotMetadata) -> Result<()> {
        let Some(timestamp) = metadata.timestamp_filter() else {
            return self
                .delete_one(&metadata.persistence_id, metadata.sequence_nr)
                .await;
        };

        let store = self.store().await?;
        let key = entry_key(&metadata.persistence_id, metadata.sequence_nr);
        let Some(stored) = store.get(&key).await? else {
            debug!(%key, "No snapshot to delete");
            return Ok(());
        };
        let entry: SnapshotEntry = from_document(stored.content)?;
        if entry.timestamp != timestamp {
            debug!(%key, stored = entry.timestamp, timestamp, "Snapshot timestamp differs, kept");
            return Ok(());
        }
        let removed = store.remove(&key).await?;
        debug!(%key, removed, "Deleted snapshot");
        Ok(())
    }

    async fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        Ok(Arc::clone(&*self.lifecycle.get().await?))
    }
}

/// Predicates shared by load and delete-matching. Unset bounds are omitted.
fn selection(persistence_id: &str, criteria: &SnapshotSelectionCriteria) -> Vec<Predicate> {
    let mut predicates = vec![
        field(fields::DOCUMENT_TYPE).eq(SNAPSHOT_ENTRY_TYPE),
        field(fields::PERSISTENCE_ID).eq(persistence_id),
    ];
    predicates.extend(
        criteria
            .sequence_bound()
            .map(|max| field(fields::SEQUENCE_NR).le(max)),
    );
    predicates.extend(
        criteria
            .timestamp_bound()
            .map(|max| field(fields::TIMESTAMP).le(max)),
    );
    predicates
}

#[async_trait]
impl SnapshotBackend for SnapshotStore {
    #[tracing::instrument(
        name = "snapshot.save",
        skip_all,
        fields(persistence_id = %metadata.persistence_id, sequence_nr = metadata.sequence_nr)
    )]
    async fn save(&self, metadata: &SnapshotMetadata, snapshot: Bytes) -> Result<()> {
        let store = self.store().await?;
        let entry = SnapshotEntry::new(
            &metadata.persistence_id,
            metadata.sequence_nr,
            metadata.timestamp,
            snapshot,
        );
        store.upsert(&entry.key, to_document(&entry)?).await?;
        debug!(key = %entry.key, "Saved snapshot");
        Ok(())
    }

    #[tracing::instrument(name = "snapshot.load", skip_all, fields(%persistence_id))]
    async fn load_latest(
        &self,
        persistence_id: &str,
        criteria: SnapshotSelectionCriteria,
    ) -> Result<Option<SelectedSnapshot>> {
        let store = self.store().await?;
        let query = selection(persistence_id, &criteria)
            .into_iter()
            .fold(SelectQuery::from(store.bucket()), SelectQuery::and_where)
            .order_by(fields::SEQUENCE_NR, Order::Desc)
            .limit(1);
        debug!(statement = %query.to_statement().text, "Loading snapshot");

        let Some(row) = store.query(&query).await?.into_iter().next() else {
            debug!(?criteria, "No snapshot matched");
            return Ok(None);
        };
        let entry: SnapshotEntry = from_document(row)?;
        debug!(sequence_nr = entry.sequence_nr, "Loaded snapshot");
        Ok(Some(SelectedSnapshot {
            metadata: SnapshotMetadata::new(entry.persistence_id, entry.sequence_nr, entry.timestamp),
            snapshot: entry.payload,
        }))
    }

    #[tracing::instrument(name = "snapshot.delete", skip_all, fields(%persistence_id, sequence_nr = sequence_nr))]
    async fn delete_one(&self, persistence_id: &str, sequence_nr: i64) -> Result<()> {
        let store = self.store().await?;
        let key = entry_key(persistence_id, sequence_nr);
        let removed = store.remove(&key).await?;
        debug!(%key, removed, "Deleted snapshot");
        Ok(())
    }

    #[tracing::instrument(name = "snapshot.delete", skip_all, fields(%persistence_id))]
    async fn delete_matching(
        &self,
        persistence_id: &str,
        criteria: SnapshotSelectionCriteria,
    ) -> Result<()> {
        let store = self.store().await?;
        let query = selection(persistence_id, &criteria)
            .into_iter()
            .fold(DeleteQuery::from(store.bucket()), DeleteQuery::and_where);

        let removed = store.delete_where(&query).await?;
        debug!(?criteria, removed, "Deleted matching snapshots");
        Ok(())
    }
}
