//! MutationQueue implementation

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::BoundedCache;
use crate::record::Record;
use crate::storage::ShardContents;

use super::QueueKind;

/// Queued state of a key inside one shard
#[derive(Debug, PartialEq)]
pub enum Pending<'a> {
    /// An upsert waiting for (or undergoing) a flush
    Set(&'a Record),
    /// A removal waiting for (or undergoing) a flush
    Deleted,
    /// Nothing queued; disk is authoritative
    None,
}

/// Pending mutations, read cache and debounce deadlines of one table
#[derive(Debug, Default)]
pub struct MutationQueue {
    set: HashMap<String, HashMap<String, Record>>,
    delete: HashMap<String, HashSet<String>>,
    get: HashMap<String, Arc<ShardContents>>,
    all: Option<BoundedCache>,

    /// Batches taken by a running flush, still visible to readers
    flushing_set: Arc<HashMap<String, HashMap<String, Record>>>,
    flushing_delete: Arc<HashMap<String, HashSet<String>>>,

    /// Armed debounce deadlines (unix ms)
    deadlines: HashMap<QueueKind, u64>,

    /// key → expiry (unix ms)
    expiries: HashMap<String, u64>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Mutation Batches
    // =========================================================================

    /// Queue an upsert against the record's shard.
    ///
    /// Cancels a queued delete of the same key in that shard.
    pub fn add_set(&mut self, record: Record) {
        let shard = record.file().to_string();
        if let Some(keys) = self.delete.get_mut(&shard) {
            keys.remove(record.key());
        }
        self.set
            .entry(shard)
            .or_default()
            .insert(record.key().to_string(), record);
    }

    /// Queue a removal. Cancels a queued upsert of the same key in that shard.
    pub fn add_delete(&mut self, shard: &str, key: &str) {
        if let Some(records) = self.set.get_mut(shard) {
            records.remove(key);
        }
        self.delete
            .entry(shard.to_string())
            .or_default()
            .insert(key.to_string());
    }

    /// Most recent queued state of `key` in `shard`
    pub fn pending(&self, shard: &str, key: &str) -> Pending<'_> {
        if let Some(record) = self.set.get(shard).and_then(|b| b.get(key)) {
            return Pending::Set(record);
        }
        if self.delete.get(shard).is_some_and(|b| b.contains(key)) {
            return Pending::Deleted;
        }
        if let Some(record) = self.flushing_set.get(shard).and_then(|b| b.get(key)) {
            return Pending::Set(record);
        }
        if self.flushing_delete.get(shard).is_some_and(|b| b.contains(key)) {
            return Pending::Deleted;
        }
        Pending::None
    }

    /// Queued upserts in `shard` that are not yet on disk (current and in flight)
    pub fn pending_sets_for(&self, shard: &str) -> Vec<&Record> {
        let current = self.set.get(shard);
        let flushing = self
            .flushing_set
            .get(shard)
            .into_iter()
            .flat_map(|b| b.values())
            .filter(|r| current.map_or(true, |c| !c.contains_key(r.key())));
        current
            .into_iter()
            .flat_map(|b| b.values())
            .chain(flushing)
            .collect()
    }

    /// Whether any upsert targets `shard`, queued or in flight
    pub fn has_pending_sets(&self, shard: &str) -> bool {
        let non_empty = |b: Option<&HashMap<String, Record>>| b.is_some_and(|b| !b.is_empty());
        non_empty(self.set.get(shard)) || non_empty(self.flushing_set.get(shard))
    }

    /// Move the `set` batch in flight and hand it to the flusher
    pub fn begin_set_flush(&mut self) -> Arc<HashMap<String, HashMap<String, Record>>> {
        let batch: HashMap<_, _> = std::mem::take(&mut self.set)
            .into_iter()
            .filter(|(_, records)| !records.is_empty())
            .collect();
        self.flushing_set = Arc::new(batch);
        Arc::clone(&self.flushing_set)
    }

    /// Drop the in-flight `set` batch; its shards' read cache is stale now
    pub fn finish_set_flush(&mut self) {
        let shards: Vec<String> = self.flushing_set.keys().cloned().collect();
        for shard in shards {
            self.get.remove(&shard);
        }
        self.flushing_set = Arc::default();
    }

    pub fn begin_delete_flush(&mut self) -> Arc<HashMap<String, HashSet<String>>> {
        let batch: HashMap<_, _> = std::mem::take(&mut self.delete)
            .into_iter()
            .filter(|(_, keys)| !keys.is_empty())
            .collect();
        self.flushing_delete = Arc::new(batch);
        Arc::clone(&self.flushing_delete)
    }

    pub fn finish_delete_flush(&mut self) {
        let shards: Vec<String> = self.flushing_delete.keys().cloned().collect();
        for shard in shards {
            self.get.remove(&shard);
        }
        self.flushing_delete = Arc::default();
    }

    /// Put back an upsert whose flush failed, unless a newer mutation of
    /// the same key is already queued
    pub fn requeue_set(&mut self, record: Record) {
        if self.is_superseded(record.file(), record.key()) {
            return;
        }
        self.set
            .entry(record.file().to_string())
            .or_default()
            .insert(record.key().to_string(), record);
    }

    /// Put back a removal whose flush failed (same rule as `requeue_set`)
    pub fn requeue_delete(&mut self, shard: &str, key: &str) {
        if self.is_superseded(shard, key) {
            return;
        }
        self.delete
            .entry(shard.to_string())
            .or_default()
            .insert(key.to_string());
    }

    fn is_superseded(&self, shard: &str, key: &str) -> bool {
        self.set.get(shard).is_some_and(|b| b.contains_key(key))
            || self.delete.get(shard).is_some_and(|b| b.contains(key))
    }

    /// Remove every batch entry for `shard`
    pub fn delete_path_from_queue(&mut self, shard: &str) {
        self.set.remove(shard);
        self.delete.remove(shard);
        self.get.remove(shard);
    }

    pub fn pending_set_count(&self) -> usize {
        self.set.values().map(HashMap::len).sum()
    }

    pub fn pending_delete_count(&self) -> usize {
        self.delete.values().map(HashSet::len).sum()
    }

    // =========================================================================
    // Read Cache
    // =========================================================================

    pub fn cached_shard(&self, shard: &str) -> Option<Arc<ShardContents>> {
        self.get.get(shard).cloned()
    }

    pub fn cache_shard(&mut self, shard: &str, contents: Arc<ShardContents>) {
        self.get.insert(shard.to_string(), contents);
    }

    pub fn clear_read_cache(&mut self) {
        self.get.clear();
    }

    // =========================================================================
    // Full-Scan Snapshot
    // =========================================================================

    pub fn snapshot(&self) -> Option<&BoundedCache> {
        self.all.as_ref()
    }

    pub fn snapshot_mut(&mut self) -> Option<&mut BoundedCache> {
        self.all.as_mut()
    }

    pub fn set_snapshot(&mut self, snapshot: BoundedCache) {
        self.all = Some(snapshot);
    }

    pub fn clear_snapshot(&mut self) {
        self.all = None;
    }

    // =========================================================================
    // Debounce Deadlines
    // =========================================================================

    /// Arm `kind` to fire `window` ms after `now` unless already armed.
    ///
    /// Returns true when this call armed it.
    pub fn arm(&mut self, kind: QueueKind, now: u64, window: u64) -> bool {
        if self.deadlines.contains_key(&kind) {
            return false;
        }
        self.deadlines.insert(kind, now.saturating_add(window));
        true
    }

    pub fn disarm(&mut self, kind: QueueKind) {
        self.deadlines.remove(&kind);
    }

    pub fn is_queued(&self, kind: QueueKind) -> bool {
        match kind {
            QueueKind::All => self.all.is_some(),
            other => self.deadlines.contains_key(&other),
        }
    }

    pub fn deadline(&self, kind: QueueKind) -> Option<u64> {
        self.deadlines.get(&kind).copied()
    }

    /// Kinds whose deadline has passed, in firing order. Disarms them.
    pub fn take_due(&mut self, now: u64) -> Vec<QueueKind> {
        let due: Vec<QueueKind> = QueueKind::ALL
            .into_iter()
            .filter(|kind| matches!(self.deadlines.get(kind), Some(&at) if at <= now))
            .collect();
        for kind in &due {
            self.deadlines.remove(kind);
        }
        due
    }

    // =========================================================================
    // TTL Expiry
    // =========================================================================

    pub fn schedule_expiry(&mut self, key: &str, at: u64) {
        self.expiries.insert(key.to_string(), at);
    }

    pub fn cancel_expiry(&mut self, key: &str) {
        self.expiries.remove(key);
    }

    /// Keys whose expiry has passed; they are unscheduled
    pub fn take_expired(&mut self, now: u64) -> Vec<String> {
        let mut expired: Vec<String> = self
            .expiries
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        expired.sort();
        for key in &expired {
            self.expiries.remove(key);
        }
        expired
    }

    pub fn scheduled_expiries(&self) -> usize {
        self.expiries.len()
    }

    /// Forget every batch, deadline and expiry
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
