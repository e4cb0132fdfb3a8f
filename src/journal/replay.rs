//! Ranged replay and highest sequence number lookup.

use tracing::debug;

use crate::interfaces::{DocumentStore, Result};
use crate::persistent::{EventPayload, PersistentRepr};
use crate::storage::query::{field, Order, SelectQuery};
use crate::storage::schema::{fields, from_document, JournalEntry, JOURNAL_ENTRY_TYPE};

impl From<JournalEntry> for PersistentRepr {
    fn from(entry: JournalEntry) -> Self {
        PersistentRepr {
            persistence_id: entry.persistence_id,
            sequence_nr: entry.sequence_nr,
            payload: EventPayload::Plain(entry.payload),
            manifest: entry.manifest,
            is_deleted: entry.is_deleted,
        }
    }
}

/// Journal entries for one identity.
fn journal_entries(store: &dyn DocumentStore, persistence_id: &str) -> SelectQuery {
    SelectQuery::from(store.bucket())
        .and_where(field(fields::DOCUMENT_TYPE).eq(JOURNAL_ENTRY_TYPE))
        .and_where(field(fields::PERSISTENCE_ID).eq(persistence_id))
}

/// Deliver entries in `[from, to]` to `emit` in ascending sequence order.
///
/// All rows are decoded before the first `emit`, so a decode failure
/// delivers nothing.
pub(super) async fn replay(
    store: &dyn DocumentStore,
    persistence_id: &str,
    from: i64,
    to: i64,
    max: u64,
    emit: &mut (dyn FnMut(PersistentRepr) + Send),
) -> Result<()> {
    if max == 0 {
        debug!(%persistence_id, "Replay with max 0, nothing to do");
        return Ok(());
    }

    let limit = u32::try_from(max).unwrap_or(u32::MAX);
    let query = journal_entries(store, persistence_id)
        .and_where(field(fields::SEQUENCE_NR).ge(from))
        .and_where(field(fields::SEQUENCE_NR).le(to))
        .order_by(fields::SEQUENCE_NR, Order::Asc)
        .limit(limit);
    debug!(statement = %query.to_statement().text, limit, "Replaying journal range");

    let rows = store.query(&query).await?;
    let events = rows
        .into_iter()
        .map(|row| from_document::<JournalEntry>(row).map(PersistentRepr::from))
        .collect::<Result<Vec<_>>>()?;

    debug!(%persistence_id, rows = events.len(), "Replay complete");
    for event in events {
        emit(event);
    }
    Ok(())
}

/// Highest stored sequence number for the identity, or 0 when it has none.
///
/// `from` is only a hint and does not narrow the query.
pub(super) async fn highest_sequence_nr(
    store: &dyn DocumentStore,
    persistence_id: &str,
    from: i64,
) -> Result<i64> {
    let query = journal_entries(store, persistence_id)
        .order_by(fields::SEQUENCE_NR, Order::Desc)
        .limit(1);

    let highest = match store.query(&query).await?.into_iter().next() {
        Some(row) => from_document::<JournalEntry>(row)?.sequence_nr,
        None => 0,
    };
    debug!(%persistence_id, from, highest, "Read highest sequence number");
    Ok(highest)
}
