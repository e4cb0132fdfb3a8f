//! Range deletion.

use tracing::debug;

use crate::interfaces::{DocumentStore, Result};
use crate::storage::query::{field, DeleteQuery};
use crate::storage::schema::{fields, JOURNAL_ENTRY_TYPE};

/// Permanently remove the identity's entries with sequence number <= `to`.
///
/// `i64::MAX` drops the upper bound and removes every entry. The high-water
/// mark document is left alone.
pub(super) async fn delete_to(store: &dyn DocumentStore, persistence_id: &str, to: i64) -> Result<()> {
    let upper_bound = (to != i64::MAX).then(|| field(fields::SEQUENCE_NR).le(to));
    let query = DeleteQuery::from(store.bucket())
        .and_where(field(fields::DOCUMENT_TYPE).eq(JOURNAL_ENTRY_TYPE))
        .and_where(field(fields::PERSISTENCE_ID).eq(persistence_id))
        .and_where_opt(upper_bound);

    let removed = store.delete_where(&query).await?;
    debug!(%persistence_id, to, removed, "Deleted journal entries");
    Ok(())
}
