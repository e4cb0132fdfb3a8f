//! Event journal backed by a `DocumentStore`.
//!
//! Events live in the journal bucket as `JournalEntry` documents keyed by
//! `{persistenceId}_{sequenceNr}`. The per-identity high-water mark lives in
//! its own keyspace: the `metadata` collection of the journal bucket unless
//! configured apart.
//!
//! The work is split by operation:
//! - `write`: batch upserts, high-water mark update, notifications
//! - `replay`: ranged replay and highest sequence lookup
//! - `delete`: range deletion

mod delete;
mod replay;
mod write;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::JournalSettings;
use crate::interfaces::{
    DocumentStore, JournalBackend, PersistenceError, Result, StoreConnector,
};
use crate::lifecycle::{BackendState, Lifecycle};
use crate::persistent::{AtomicWrite, PersistentRepr};
use crate::storage::schema::{from_document, MetadataEntry};
use crate::subscription::SubscriptionRegistry;
use crate::utils::bootstrap::connect_with_retry;

/// Stores the journal talks to once connected.
struct JournalStores {
    journal: Arc<dyn DocumentStore>,
    metadata: Arc<dyn DocumentStore>,
}

/// Journal backend.
pub struct Journal {
    settings: JournalSettings,
    lifecycle: Lifecycle<JournalStores>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl Journal {
    /// Create an unstarted journal with its own subscription registry.
    pub fn new(settings: JournalSettings) -> Self {
        Self::with_subscriptions(settings, Arc::new(SubscriptionRegistry::new()))
    }

    /// Create an unstarted journal notifying through `subscriptions`.
    pub fn with_subscriptions(
        settings: JournalSettings,
        subscriptions: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            settings,
            lifecycle: Lifecycle::new(),
            subscriptions,
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    pub async fn state(&self) -> BackendState {
        self.lifecycle.state().await
    }

    /// Connect the journal and metadata buckets and become ready.
    ///
    /// A failed start is terminal: the journal moves to `Closed` and the host
    /// has to build a new instance to try again.
    pub async fn start(&self, connector: &dyn StoreConnector) -> Result<()> {
        self.lifecycle.begin_connect().await?;

        let stores = match self.connect(connector).await {
            Ok(stores) => stores,
            Err(e) => {
                self.lifecycle.fail().await;
                error!(error = %e, "Journal failed to start");
                return Err(e);
            }
        };

        let journal_bucket = stores.journal.bucket().to_string();
        let metadata_bucket = stores.metadata.bucket().to_string();
        match self.lifecycle.ready(stores).await {
            BackendState::Ready => {
                info!(
                    journal_bucket = %journal_bucket,
                    metadata_bucket = %metadata_bucket,
                    "Journal ready"
                );
                Ok(())
            }
            state => Err(PersistenceError::NotInitialized { state }),
        }
    }

    async fn connect(&self, connector: &dyn StoreConnector) -> Result<JournalStores> {
        let journal_endpoint = self.settings.journal_endpoint()?;
        let metadata_endpoint = self.settings.metadata_endpoint()?;
        let retry = &self.settings.connect_retry;

        let journal = connect_with_retry(connector, &journal_endpoint, retry)
            .await
            .map_err(PersistenceError::ConnectionFailure)?;
        let metadata = connect_with_retry(connector, &metadata_endpoint, retry)
            .await
            .map_err(PersistenceError::ConnectionFailure)?;

        Ok(JournalStores { journal, metadata })
    }

    /// Stop serving. Later calls fail with `NotInitialized`.
    pub async fn close(&self) {
        self.lifecycle.close().await;
        info!("Journal closed");
    }

    /// The recorded high-water mark for an identity, or 0 when none exists.
    ///
    /// Unlike `read_highest_sequence_nr` this reads the metadata document,
    /// so it survives deletion of the journal entries themselves.
    pub async fn high_water_mark(&self, persistence_id: &str) -> Result<i64> {
        let stores = self.lifecycle.get().await?;
        match stores.metadata.get(persistence_id).await? {
            Some(stored) => {
                let entry: MetadataEntry = from_document(stored.content)?;
                Ok(entry.highest_sequence_nr)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl JournalBackend for Journal {
    #[tracing::instrument(name = "journal.write", skip_all, fields(groups = writes.len()))]
    async fn write_messages(&self, writes: Vec<AtomicWrite>) -> Result<Vec<Result<()>>> {
        let stores = self.lifecycle.get().await?;
        self.write_batch(&stores, writes).await
    }

    #[tracing::instrument(
        name = "journal.replay",
        skip_all,
        fields(%persistence_id, from = from, to = to, max = max)
    )]
    async fn replay_messages(
        &self,
        persistence_id: &str,
        from: i64,
        to: i64,
        max: u64,
        emit: &mut (dyn FnMut(PersistentRepr) + Send),
    ) -> Result<()> {
        let stores = self.lifecycle.get().await?;
        replay::replay(stores.journal.as_ref(), persistence_id, from, to, max, emit).await
    }

    #[tracing::instrument(
        name = "journal.highest_sequence_nr",
        skip_all,
        fields(%persistence_id, from = from)
    )]
    async fn read_highest_sequence_nr(&self, persistence_id: &str, from: i64) -> Result<i64> {
        let stores = self.lifecycle.get().await?;
        replay::highest_sequence_nr(stores.journal.as_ref(), persistence_id, from).await
    }

    #[tracing::instrument(name = "journal.delete_to", skip_all, fields(%persistence_id, to = to))]
    async fn delete_messages_to(&self, persistence_id: &str, to: i64) -> Result<()> {
        let stores = self.lifecycle.get().await?;
        delete::delete_to(stores.journal.as_ref(), persistence_id, to).await
    }
}
