//! SnapshotBackend interface tests.
//!
//! These tests verify the contract of the SnapshotBackend trait.
//! Each storage implementation should run these tests.

use bytes::Bytes;
use uuid::Uuid;

use docjournal::{SnapshotBackend, SnapshotMetadata, SnapshotSelectionCriteria};

fn fresh_id(prefix: &str) -> String {
    format!("test_snap_{}_{}", prefix, Uuid::new_v4())
}

/// Save a snapshot whose payload encodes its sequence number.
pub async fn save_at<S: SnapshotBackend>(store: &S, persistence_id: &str, seq: i64, timestamp: i64) {
    store
        .save(
            &SnapshotMetadata::new(persistence_id, seq, timestamp),
            Bytes::from(vec![10, 20, 30, seq as u8]),
        )
        .await
        .expect("save should succeed");
}

async fn latest<S: SnapshotBackend>(
    store: &S,
    persistence_id: &str,
    criteria: SnapshotSelectionCriteria,
) -> Option<i64> {
    store
        .load_latest(persistence_id, criteria)
        .await
        .expect("load should succeed")
        .map(|s| s.metadata.sequence_nr)
}

// =============================================================================
// load_latest tests
// =============================================================================

pub async fn test_load_nonexistent<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("nonexist");
    assert_eq!(latest(store, &id, SnapshotSelectionCriteria::latest()).await, None);
}

pub async fn test_load_preserves_data<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("data");
    let data = vec![1, 2, 3, 4, 5, 100, 200, 255];
    store
        .save(&SnapshotMetadata::new(id.as_str(), 5, 12345), Bytes::from(data.clone()))
        .await
        .unwrap();

    let loaded = store
        .load_latest(&id, SnapshotSelectionCriteria::latest())
        .await
        .unwrap()
        .expect("snapshot should exist");

    assert_eq!(loaded.snapshot.as_ref(), data.as_slice());
    assert_eq!(loaded.metadata, SnapshotMetadata::new(id.as_str(), 5, 12345));
}

pub async fn test_load_newest_unbounded<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("newest");
    for seq in [3, 1, 5, 2] {
        save_at(store, &id, seq, seq * 10).await;
    }
    assert_eq!(latest(store, &id, SnapshotSelectionCriteria::latest()).await, Some(5));
}

pub async fn test_load_sequence_bound<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("seq_bound");
    for seq in [1, 3, 5] {
        save_at(store, &id, seq, seq * 10).await;
    }

    let criteria = SnapshotSelectionCriteria::latest().with_max_sequence_nr(4);
    assert_eq!(latest(store, &id, criteria).await, Some(3));
}

pub async fn test_load_timestamp_bound<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("ts_bound");
    for seq in [1, 3, 5] {
        save_at(store, &id, seq, seq * 10).await;
    }

    let criteria = SnapshotSelectionCriteria::latest().with_max_timestamp(30);
    assert_eq!(latest(store, &id, criteria).await, Some(3));

    let none = SnapshotSelectionCriteria::latest().with_max_timestamp(5);
    assert_eq!(latest(store, &id, none).await, None);
}

pub async fn test_load_identity_isolation<S: SnapshotBackend>(store: &S) {
    let a = fresh_id("iso_a");
    let b = fresh_id("iso_b");
    save_at(store, &a, 1, 0).await;
    save_at(store, &b, 8, 0).await;

    assert_eq!(latest(store, &a, SnapshotSelectionCriteria::latest()).await, Some(1));
}

// =============================================================================
// save tests
// =============================================================================

pub async fn test_save_overwrites_same_sequence<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("overwrite");
    save_at(store, &id, 2, 10).await;
    store
        .save(&SnapshotMetadata::new(id.as_str(), 2, 20), Bytes::from_static(b"second"))
        .await
        .unwrap();

    let loaded = store
        .load_latest(&id, SnapshotSelectionCriteria::latest())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.snapshot, Bytes::from_static(b"second"));
    assert_eq!(loaded.metadata.timestamp, 20);
}

// =============================================================================
// delete tests
// =============================================================================

pub async fn test_delete_one<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("delete_one");
    save_at(store, &id, 1, 0).await;
    save_at(store, &id, 2, 0).await;

    store.delete_one(&id, 2).await.expect("delete should succeed");

    assert_eq!(latest(store, &id, SnapshotSelectionCriteria::latest()).await, Some(1));
}

pub async fn test_delete_one_nonexistent<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("delete_missing");
    store
        .delete_one(&id, 42)
        .await
        .expect("deleting a missing snapshot should succeed");
}

pub async fn test_delete_matching_bounded<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("delete_matching");
    for seq in 1..=5 {
        save_at(store, &id, seq, seq * 10).await;
    }

    store
        .delete_matching(&id, SnapshotSelectionCriteria::latest().with_max_sequence_nr(3))
        .await
        .unwrap();

    let at_most_three = SnapshotSelectionCriteria::latest().with_max_sequence_nr(3);
    assert_eq!(latest(store, &id, at_most_three).await, None);
    assert_eq!(latest(store, &id, SnapshotSelectionCriteria::latest()).await, Some(5));
}

pub async fn test_delete_matching_unbounded<S: SnapshotBackend>(store: &S) {
    let a = fresh_id("delete_all_a");
    let b = fresh_id("delete_all_b");
    save_at(store, &a, 1, 0).await;
    save_at(store, &a, 2, 0).await;
    save_at(store, &b, 1, 0).await;

    store
        .delete_matching(&a, SnapshotSelectionCriteria::latest())
        .await
        .unwrap();

    assert_eq!(latest(store, &a, SnapshotSelectionCriteria::latest()).await, None);
    assert_eq!(latest(store, &b, SnapshotSelectionCriteria::latest()).await, Some(1));
}

pub async fn test_delete_then_resave<S: SnapshotBackend>(store: &S) {
    let id = fresh_id("resave");
    save_at(store, &id, 4, 0).await;
    store.delete_one(&id, 4).await.unwrap();
    save_at(store, &id, 4, 0).await;

    assert_eq!(latest(store, &id, SnapshotSelectionCriteria::latest()).await, Some(4));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all SnapshotBackend interface tests against a backend.
#[macro_export]
macro_rules! run_snapshot_tests {
    ($store:expr) => {
        use $crate::storage::snapshot_tests::*;

        // load tests
        test_load_nonexistent($store).await;
        println!("  test_load_nonexistent: PASSED");

        test_load_preserves_data($store).await;
        println!("  test_load_preserves_data: PASSED");

        test_load_newest_unbounded($store).await;
        println!("  test_load_newest_unbounded: PASSED");

        test_load_sequence_bound($store).await;
        println!("  test_load_sequence_bound: PASSED");

        test_load_timestamp_bound($store).await;
        println!("  test_load_timestamp_bound: PASSED");

        test_load_identity_isolation($store).await;
        println!("  test_load_identity_isolation: PASSED");

        // save tests
        test_save_overwrites_same_sequence($store).await;
        println!("  test_save_overwrites_same_sequence: PASSED");

        // delete tests
        test_delete_one($store).await;
        println!("  test_delete_one: PASSED");

        test_delete_one_nonexistent($store).await;
        println!("  test_delete_one_nonexistent: PASSED");

        test_delete_matching_bounded($store).await;
        println!("  test_delete_matching_bounded: PASSED");

        test_delete_matching_unbounded($store).await;
        println!("  test_delete_matching_unbounded: PASSED");

        test_delete_then_resave($store).await;
        println!("  test_delete_then_resave: PASSED");
    };
}
