//! Batch writes: event upserts, high-water mark update, notifications.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use tracing::{debug, warn};

use super::{Journal, JournalStores};
use crate::interfaces::{DocumentStore, PersistenceError, Result, StoreError};
use crate::persistent::AtomicWrite;
use crate::storage::schema::{from_document, to_document, JournalEntry, MetadataEntry};

impl Journal {
    /// Write every group, then raise each identity's high-water mark, then
    /// notify subscribers.
    ///
    /// Groups run concurrently; events within a group go out in ascending
    /// sequence order and the first failure ends that group. The high-water
    /// marks cover the whole batch, failed groups included, and the
    /// notifications likewise go out for the whole batch.
    pub(super) async fn write_batch(
        &self,
        stores: &JournalStores,
        writes: Vec<AtomicWrite>,
    ) -> Result<Vec<Result<()>>> {
        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let collect_tags = self.subscriptions.has_tag_subscribers().await;
        let mut tags = BTreeSet::new();
        let mut high_water: BTreeMap<&str, i64> = BTreeMap::new();
        for write in &writes {
            let sequence_nr = write.highest_sequence_nr();
            high_water
                .entry(write.persistence_id())
                .and_modify(|highest| *highest = (*highest).max(sequence_nr))
                .or_insert(sequence_nr);

            if collect_tags {
                for event in write.events() {
                    if let Some(event_tags) = event.payload.tags() {
                        tags.extend(event_tags.iter().cloned());
                    }
                }
            }
        }

        let journal = stores.journal.as_ref();
        let results = join_all(writes.iter().map(|write| write_group(journal, write))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(
            groups = results.len(),
            failed,
            identities = high_water.len(),
            "Wrote journal batch"
        );

        for (persistence_id, highest) in &high_water {
            raise_high_water_mark(stores.metadata.as_ref(), persistence_id, *highest).await?;
        }

        self.notify_batch(high_water.keys().copied(), &tags).await;

        Ok(results)
    }

    async fn notify_batch<'a>(
        &self,
        persistence_ids: impl Iterator<Item = &'a str>,
        tags: &BTreeSet<String>,
    ) {
        let registry = &self.subscriptions;

        if registry.has_identity_subscribers().await {
            for persistence_id in persistence_ids {
                registry.notify_identity(persistence_id).await;
            }
        }

        for tag in tags {
            registry.notify_tag(tag).await;
        }

        if registry.has_new_event_subscribers().await {
            registry.notify_new_event().await;
        }
    }
}

/// Upsert one group's events in order, stopping at the first failure.
async fn write_group(store: &dyn DocumentStore, write: &AtomicWrite) -> Result<()> {
    let persistence_id = write.persistence_id();
    for event in write.events() {
        let entry = JournalEntry::new(
            persistence_id,
            event.sequence_nr,
            event.payload.bytes().clone(),
            &event.manifest,
            event.is_deleted,
        );
        let document = to_document(&entry)?;
        if let Err(source) = store.upsert(&entry.key, document).await {
            warn!(
                %persistence_id,
                sequence_nr = event.sequence_nr,
                error = %source,
                "Write group failed"
            );
            return Err(PersistenceError::WriteGroup {
                persistence_id: persistence_id.to_string(),
                source,
            });
        }
    }
    Ok(())
}

/// Set the identity's high-water mark to `max(current, highest)`.
///
/// Compare-and-set loop: a concurrent writer can only make the stored value
/// larger, so a conflict is resolved by re-reading and comparing again.
pub(super) async fn raise_high_water_mark(
    store: &dyn DocumentStore,
    persistence_id: &str,
    highest: i64,
) -> Result<()> {
    loop {
        let outcome = match store.get(persistence_id).await? {
            None => {
                let document = to_document(&MetadataEntry::new(persistence_id, highest))?;
                store.insert(persistence_id, document).await
            }
            Some(stored) => {
                let current: MetadataEntry = from_document(stored.content)?;
                if current.highest_sequence_nr >= highest {
                    return Ok(());
                }
                let document = to_document(&MetadataEntry::new(persistence_id, highest))?;
                store.replace(persistence_id, document, stored.cas).await
            }
        };

        match outcome {
            Ok(_) => {
                debug!(%persistence_id, highest, "Raised high-water mark");
                return Ok(());
            }
            Err(StoreError::AlreadyExists { .. } | StoreError::CasMismatch { .. }) => {
                debug!(%persistence_id, "High-water mark changed concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
