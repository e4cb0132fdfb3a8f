//! JournalBackend interface tests.
//!
//! These tests verify the contract of the JournalBackend trait. Every test
//! uses fresh persistence ids, so the suite can share one journal.

use uuid::Uuid;

use docjournal::{AtomicWrite, JournalBackend, PersistentRepr};

/// A persistence id no other test uses.
pub fn fresh_id(prefix: &str) -> String {
    format!("test_{}_{}", prefix, Uuid::new_v4())
}

/// Build a write group with one event per sequence number.
pub fn make_write(persistence_id: &str, seqs: impl IntoIterator<Item = i64>) -> AtomicWrite {
    let events = seqs
        .into_iter()
        .map(|seq| PersistentRepr::new(persistence_id, seq, vec![10, 20, 30, seq as u8]))
        .collect();
    AtomicWrite::new(events).expect("write group should be valid")
}

/// Replay `[from, to]` with at most `max` events, collecting what is emitted.
pub async fn replay<J: JournalBackend>(
    journal: &J,
    persistence_id: &str,
    from: i64,
    to: i64,
    max: u64,
) -> Vec<PersistentRepr> {
    let mut replayed = Vec::new();
    journal
        .replay_messages(persistence_id, from, to, max, &mut |event| replayed.push(event))
        .await
        .expect("replay should succeed");
    replayed
}

fn sequence_nrs(events: &[PersistentRepr]) -> Vec<i64> {
    events.iter().map(|e| e.sequence_nr).collect()
}

async fn write_ok<J: JournalBackend>(journal: &J, writes: Vec<AtomicWrite>) {
    let results = journal
        .write_messages(writes)
        .await
        .expect("write batch should succeed");
    for result in results {
        result.expect("write group should succeed");
    }
}

// =============================================================================
// write_messages / read_highest_sequence_nr tests
// =============================================================================

pub async fn test_highest_for_unknown_identity<J: JournalBackend>(journal: &J) {
    let id = fresh_id("unknown");
    let highest = journal
        .read_highest_sequence_nr(&id, 0)
        .await
        .expect("lookup should succeed");
    assert_eq!(highest, 0, "identity without events should report 0");
}

pub async fn test_write_then_highest<J: JournalBackend>(journal: &J) {
    let id = fresh_id("highest");
    write_ok(journal, vec![make_write(&id, 1..=5)]).await;

    let highest = journal.read_highest_sequence_nr(&id, 0).await.unwrap();
    assert_eq!(highest, 5);
}

pub async fn test_sequential_batches_highest<J: JournalBackend>(journal: &J) {
    let id = fresh_id("batches");
    write_ok(journal, vec![make_write(&id, 1..=2)]).await;
    write_ok(journal, vec![make_write(&id, 3..=3)]).await;
    write_ok(journal, vec![make_write(&id, 4..=9)]).await;

    assert_eq!(journal.read_highest_sequence_nr(&id, 0).await.unwrap(), 9);
}

pub async fn test_one_result_per_group<J: JournalBackend>(journal: &J) {
    let a = fresh_id("group_a");
    let b = fresh_id("group_b");
    let results = journal
        .write_messages(vec![make_write(&a, 1..=2), make_write(&b, 1..=1), make_write(&a, 3..=3)])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(journal.read_highest_sequence_nr(&a, 0).await.unwrap(), 3);
    assert_eq!(journal.read_highest_sequence_nr(&b, 0).await.unwrap(), 1);
}

pub async fn test_rewrite_is_idempotent<J: JournalBackend>(journal: &J) {
    let id = fresh_id("rewrite");
    write_ok(journal, vec![make_write(&id, 1..=3)]).await;
    let replacement = AtomicWrite::new(vec![PersistentRepr::new(id.as_str(), 2, "replaced")]).unwrap();
    write_ok(journal, vec![replacement]).await;

    let events = replay(journal, &id, 1, i64::MAX, u64::MAX).await;
    assert_eq!(sequence_nrs(&events), vec![1, 2, 3], "no duplicate entry expected");
    assert_eq!(events[1].payload.bytes().as_ref(), b"replaced");
}

// =============================================================================
// replay_messages tests
// =============================================================================

pub async fn test_replay_range<J: JournalBackend>(journal: &J) {
    let id = fresh_id("range");
    write_ok(journal, vec![make_write(&id, 1..=5)]).await;

    let events = replay(journal, &id, 2, 4, 10).await;
    assert_eq!(sequence_nrs(&events), vec![2, 3, 4]);
}

pub async fn test_replay_max_zero<J: JournalBackend>(journal: &J) {
    let id = fresh_id("max_zero");
    write_ok(journal, vec![make_write(&id, 1..=3)]).await;

    let events = replay(journal, &id, 1, i64::MAX, 0).await;
    assert!(events.is_empty(), "max 0 should emit nothing");
}

pub async fn test_replay_max_limits<J: JournalBackend>(journal: &J) {
    let id = fresh_id("max");
    write_ok(journal, vec![make_write(&id, 1..=10)]).await;

    let events = replay(journal, &id, 1, i64::MAX, 3).await;
    assert_eq!(sequence_nrs(&events), vec![1, 2, 3]);
}

pub async fn test_replay_huge_max<J: JournalBackend>(journal: &J) {
    let id = fresh_id("huge_max");
    write_ok(journal, vec![make_write(&id, 1..=4)]).await;

    let events = replay(journal, &id, 1, i64::MAX, u64::MAX).await;
    assert_eq!(sequence_nrs(&events), vec![1, 2, 3, 4]);
}

pub async fn test_replay_empty_range<J: JournalBackend>(journal: &J) {
    let id = fresh_id("empty_range");
    write_ok(journal, vec![make_write(&id, 1..=3)]).await;

    assert!(replay(journal, &id, 4, 10, 10).await.is_empty());
    assert!(replay(journal, &id, 3, 2, 10).await.is_empty());
}

pub async fn test_replay_preserves_event_data<J: JournalBackend>(journal: &J) {
    let id = fresh_id("data");
    let event = PersistentRepr::new(id.as_str(), 1, vec![0u8, 1, 2, 255]).with_manifest("OrderPlaced");
    write_ok(journal, vec![AtomicWrite::new(vec![event]).unwrap()]).await;

    let events = replay(journal, &id, 1, 1, 1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].persistence_id, id);
    assert_eq!(events[0].payload.bytes().as_ref(), &[0u8, 1, 2, 255]);
    assert_eq!(events[0].manifest, "OrderPlaced");
    assert!(!events[0].is_deleted);
}

pub async fn test_replay_identity_isolation<J: JournalBackend>(journal: &J) {
    let a = fresh_id("iso_a");
    let b = fresh_id("iso_b");
    write_ok(journal, vec![make_write(&a, 1..=2), make_write(&b, 1..=5)]).await;

    let events = replay(journal, &a, 1, i64::MAX, u64::MAX).await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.persistence_id == a));
}

// =============================================================================
// delete_messages_to tests
// =============================================================================

pub async fn test_delete_to_inclusive<J: JournalBackend>(journal: &J) {
    let id = fresh_id("delete_to");
    write_ok(journal, vec![make_write(&id, 1..=5)]).await;

    journal.delete_messages_to(&id, 2).await.expect("delete should succeed");

    let events = replay(journal, &id, 1, i64::MAX, u64::MAX).await;
    assert_eq!(sequence_nrs(&events), vec![3, 4, 5]);
    assert_eq!(journal.read_highest_sequence_nr(&id, 0).await.unwrap(), 5);
}

pub async fn test_delete_to_max_removes_all<J: JournalBackend>(journal: &J) {
    let id = fresh_id("delete_all");
    write_ok(journal, vec![make_write(&id, 1..=5)]).await;

    journal.delete_messages_to(&id, i64::MAX).await.unwrap();

    assert_eq!(journal.read_highest_sequence_nr(&id, 0).await.unwrap(), 0);
    assert!(replay(journal, &id, 1, i64::MAX, u64::MAX).await.is_empty());
}

pub async fn test_delete_nonexistent<J: JournalBackend>(journal: &J) {
    let id = fresh_id("delete_none");
    journal
        .delete_messages_to(&id, 10)
        .await
        .expect("deleting nothing should succeed");
}

pub async fn test_delete_identity_isolation<J: JournalBackend>(journal: &J) {
    let a = fresh_id("del_iso_a");
    let b = fresh_id("del_iso_b");
    write_ok(journal, vec![make_write(&a, 1..=3), make_write(&b, 1..=3)]).await;

    journal.delete_messages_to(&a, i64::MAX).await.unwrap();

    assert_eq!(replay(journal, &b, 1, i64::MAX, u64::MAX).await.len(), 3);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all JournalBackend interface tests against a backend.
#[macro_export]
macro_rules! run_journal_tests {
    ($journal:expr) => {
        use $crate::storage::journal_tests::*;

        // write / highest tests
        test_highest_for_unknown_identity($journal).await;
        println!("  test_highest_for_unknown_identity: PASSED");

        test_write_then_highest($journal).await;
        println!("  test_write_then_highest: PASSED");

        test_sequential_batches_highest($journal).await;
        println!("  test_sequential_batches_highest: PASSED");

        test_one_result_per_group($journal).await;
        println!("  test_one_result_per_group: PASSED");

        test_rewrite_is_idempotent($journal).await;
        println!("  test_rewrite_is_idempotent: PASSED");

        // replay tests
        test_replay_range($journal).await;
        println!("  test_replay_range: PASSED");

        test_replay_max_zero($journal).await;
        println!("  test_replay_max_zero: PASSED");

        test_replay_max_limits($journal).await;
        println!("  test_replay_max_limits: PASSED");

        test_replay_huge_max($journal).await;
        println!("  test_replay_huge_max: PASSED");

        test_replay_empty_range($journal).await;
        println!("  test_replay_empty_range: PASSED");

        test_replay_preserves_event_data($journal).await;
        println!("  test_replay_preserves_event_data: PASSED");

        test_replay_identity_isolation($journal).await;
        println!("  test_replay_identity_isolation: PASSED");

        // delete tests
        test_delete_to_inclusive($journal).await;
        println!("  test_delete_to_inclusive: PASSED");

        test_delete_to_max_removes_all($journal).await;
        println!("  test_delete_to_max_removes_all: PASSED");

        test_delete_nonexistent($journal).await;
        println!("  test_delete_nonexistent: PASSED");

        test_delete_identity_isolation($journal).await;
        println!("  test_delete_identity_isolation: PASSED");
    };
}
