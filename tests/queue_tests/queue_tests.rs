//! Tests for MutationQueue
//!
//! These tests verify:
//! - Debounce deadlines (arm once, fire once)
//! - Set/delete batches cancelling each other
//! - In-flight batches staying visible until the flush finishes
//! - Requeue after a failed flush
//! - TTL expiry scheduling

use std::sync::Arc;

use shardkv::queue::{MutationQueue, Pending, QueueKind};
use shardkv::record::Record;
use shardkv::storage::ShardContents;

const SHARD: &str = "main_scheme_1.json";

fn record(key: &str, value: i64) -> Record {
    Record::new(key, value, SHARD)
}

// =============================================================================
// Deadline Tests
// =============================================================================

#[test]
fn test_arm_only_once() {
    let mut queue = MutationQueue::new();

    assert!(queue.arm(QueueKind::Set, 1_000, 100));
    assert!(!queue.arm(QueueKind::Set, 1_050, 100));

    assert_eq!(queue.deadline(QueueKind::Set), Some(1_100));
    assert!(queue.is_queued(QueueKind::Set));
}

#[test]
fn test_take_due_fires_in_order_and_disarms() {
    let mut queue = MutationQueue::new();
    queue.arm(QueueKind::Get, 0, 10);
    queue.arm(QueueKind::Delete, 0, 10);
    queue.arm(QueueKind::Set, 0, 50);

    assert!(queue.take_due(9).is_empty());
    assert_eq!(queue.take_due(10), vec![QueueKind::Delete, QueueKind::Get]);
    assert!(queue.take_due(10).is_empty());
    assert_eq!(queue.take_due(50), vec![QueueKind::Set]);

    assert!(!queue.is_queued(QueueKind::Set));
}

#[test]
fn test_disarm() {
    let mut queue = MutationQueue::new();
    queue.arm(QueueKind::Delete, 0, 10);

    queue.disarm(QueueKind::Delete);

    assert_eq!(queue.deadline(QueueKind::Delete), None);
    assert!(queue.arm(QueueKind::Delete, 20, 10));
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_add_set_last_write_wins() {
    let mut queue = MutationQueue::new();
    queue.add_set(record("a", 1));
    queue.add_set(record("a", 2));

    assert_eq!(queue.pending_set_count(), 1);
    match queue.pending(SHARD, "a") {
        Pending::Set(r) => assert_eq!(r, &record("a", 2)),
        other => panic!("expected a pending set, got {:?}", other),
    }
}

#[test]
fn test_set_and_delete_cancel_each_other() {
    let mut queue = MutationQueue::new();

    queue.add_set(record("a", 1));
    queue.add_delete(SHARD, "a");
    assert_eq!(queue.pending(SHARD, "a"), Pending::Deleted);
    assert_eq!(queue.pending_set_count(), 0);
    assert_eq!(queue.pending_delete_count(), 1);

    queue.add_set(record("a", 2));
    assert!(matches!(queue.pending(SHARD, "a"), Pending::Set(_)));
    assert_eq!(queue.pending_delete_count(), 0);
}

#[test]
fn test_pending_is_per_shard() {
    let mut queue = MutationQueue::new();
    queue.add_set(record("a", 1));

    assert_eq!(queue.pending("main_scheme_2.json", "a"), Pending::None);
    assert_eq!(queue.pending(SHARD, "b"), Pending::None);
    assert!(queue.has_pending_sets(SHARD));
    assert!(!queue.has_pending_sets("main_scheme_2.json"));
}

#[test]
fn test_in_flight_set_batch_stays_visible() {
    let mut queue = MutationQueue::new();
    queue.add_set(record("a", 1));

    let batch = queue.begin_set_flush();
    assert_eq!(batch.len(), 1);
    assert_eq!(queue.pending_set_count(), 0);
    assert!(matches!(queue.pending(SHARD, "a"), Pending::Set(_)));
    assert!(queue.has_pending_sets(SHARD));

    // a newer write during the flush shadows the in-flight one
    queue.add_set(record("a", 2));
    let visible: Vec<&Record> = queue.pending_sets_for(SHARD);
    assert_eq!(visible, vec![&record("a", 2)]);

    queue.finish_set_flush();
    assert_eq!(queue.pending_sets_for(SHARD).len(), 1);
}

#[test]
fn test_in_flight_delete_batch_stays_visible() {
    let mut queue = MutationQueue::new();
    queue.add_delete(SHARD, "a");

    let batch = queue.begin_delete_flush();
    assert!(batch[SHARD].contains("a"));
    assert_eq!(queue.pending(SHARD, "a"), Pending::Deleted);

    queue.finish_delete_flush();
    assert_eq!(queue.pending(SHARD, "a"), Pending::None);
}

#[test]
fn test_finish_flush_invalidates_read_cache() {
    let mut queue = MutationQueue::new();
    queue.cache_shard(SHARD, Arc::new(ShardContents::new()));
    queue.add_set(record("a", 1));

    queue.begin_set_flush();
    queue.finish_set_flush();

    assert!(queue.cached_shard(SHARD).is_none());
}

#[test]
fn test_requeue_skips_superseded() {
    let mut queue = MutationQueue::new();
    queue.add_set(record("a", 1));
    queue.add_set(record("b", 1));
    queue.begin_set_flush();

    queue.add_delete(SHARD, "a");
    queue.finish_set_flush();

    queue.requeue_set(record("a", 1));
    queue.requeue_set(record("b", 1));

    assert_eq!(queue.pending(SHARD, "a"), Pending::Deleted);
    assert!(matches!(queue.pending(SHARD, "b"), Pending::Set(_)));
}

#[test]
fn test_delete_path_from_queue() {
    let mut queue = MutationQueue::new();
    queue.add_set(record("a", 1));
    queue.add_delete(SHARD, "b");
    queue.cache_shard(SHARD, Arc::new(ShardContents::new()));

    queue.delete_path_from_queue(SHARD);

    assert_eq!(queue.pending_set_count(), 0);
    assert_eq!(queue.pending_delete_count(), 0);
    assert!(queue.cached_shard(SHARD).is_none());
}

// =============================================================================
// Read Cache and Snapshot Tests
// =============================================================================

#[test]
fn test_read_cache() {
    let mut queue = MutationQueue::new();
    let mut contents = ShardContents::new();
    contents.insert("a".into(), serde_json::json!(1));

    queue.cache_shard(SHARD, Arc::new(contents));
    assert_eq!(queue.cached_shard(SHARD).unwrap().len(), 1);

    queue.clear_read_cache();
    assert!(queue.cached_shard(SHARD).is_none());
}

#[test]
fn test_snapshot_counts_as_queued_all() {
    let mut queue = MutationQueue::new();
    assert!(!queue.is_queued(QueueKind::All));

    queue.set_snapshot(shardkv::cache::BoundedCache::unsorted(10));
    assert!(queue.is_queued(QueueKind::All));

    queue.clear_snapshot();
    assert!(queue.snapshot().is_none());
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_take_expired_sorted_and_once() {
    let mut queue = MutationQueue::new();
    queue.schedule_expiry("b", 100);
    queue.schedule_expiry("a", 50);
    queue.schedule_expiry("c", 500);

    assert!(queue.take_expired(49).is_empty());
    assert_eq!(queue.take_expired(100), vec!["a".to_string(), "b".to_string()]);
    assert!(queue.take_expired(100).is_empty());
    assert_eq!(queue.scheduled_expiries(), 1);
}

#[test]
fn test_cancel_and_reschedule_expiry() {
    let mut queue = MutationQueue::new();
    queue.schedule_expiry("a", 50);
    queue.schedule_expiry("a", 500);
    assert!(queue.take_expired(100).is_empty());

    queue.cancel_expiry("a");
    assert!(queue.take_expired(1_000).is_empty());
}

#[test]
fn test_clear_forgets_everything() {
    let mut queue = MutationQueue::new();
    queue.add_set(record("a", 1));
    queue.arm(QueueKind::Set, 0, 10);
    queue.schedule_expiry("a", 5);

    queue.clear();

    assert_eq!(queue.pending_set_count(), 0);
    assert!(!queue.is_queued(QueueKind::Set));
    assert_eq!(queue.scheduled_expiries(), 0);
}
