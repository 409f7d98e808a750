//! BoundedCache implementation
//!
//! Insertion-ordered map with a hard entry limit and optional value sorting.

use std::collections::HashMap;

use crate::record::Record;

use super::SortOrder;

/// Size-capped ordered map of key → Record
///
/// The limit holds after every `set`. A sorted cache being bulk loaded with
/// [`manual_set`](Self::manual_set) may exceed it until the next
/// [`sort`](Self::sort); `Table::connect` sorts once loading finishes.
#[derive(Debug, Clone)]
pub struct BoundedCache {
    /// Maximum resident entries
    limit: usize,

    /// Keep entries sorted by value (and evict the lowest-ranked)
    sorted: bool,

    order: SortOrder,

    /// Iteration order: insertion order, or rank once sorted
    keys: Vec<String>,

    entries: HashMap<String, Record>,
}

impl BoundedCache {
    pub fn new(limit: usize, sorted: bool, order: SortOrder) -> Self {
        Self {
            limit,
            sorted,
            order,
            keys: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Unsorted cache with the given limit
    pub fn unsorted(limit: usize) -> Self {
        Self::new(limit, false, SortOrder::Desc)
    }

    /// Insert or replace a record
    ///
    /// Returns whether the record is resident afterwards. Replacing a key that
    /// is already cached always succeeds.
    pub fn set(&mut self, record: Record) -> bool {
        if self.sorted {
            let key = record.key().to_string();
            self.insert(record);
            self.sort();
            return self.entries.contains_key(&key);
        }

        self.gated_insert(record)
    }

    /// Insert without re-sorting; call [`sort`](Self::sort) after a bulk load.
    ///
    /// Unsorted caches apply the usual capacity gate. Sorted caches accept the
    /// record and defer truncation to the next `sort()`, so the top-N survive
    /// regardless of load order.
    pub fn manual_set(&mut self, record: Record) -> bool {
        if self.sorted {
            self.insert(record);
            return true;
        }

        self.gated_insert(record)
    }

    /// Re-sort by value and truncate to the limit
    ///
    /// Stable: equal values keep their relative insertion order.
    pub fn sort(&mut self) {
        let entries = &self.entries;
        let order = self.order;
        self.keys.sort_by(|a, b| match (entries.get(a), entries.get(b)) {
            (Some(a), Some(b)) => order.compare(a.value(), b.value()),
            _ => std::cmp::Ordering::Equal,
        });

        if self.keys.len() > self.limit {
            for key in self.keys.drain(self.limit..) {
                self.entries.remove(&key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Record> {
        let removed = self.entries.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.limit
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    // =========================================================================
    // Traversal Helpers
    // =========================================================================

    /// Records in cache order
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.keys.iter().filter_map(move |k| self.entries.get(k))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.keys.iter().map(String::as_str)
    }

    pub fn find<P>(&self, mut predicate: P) -> Option<&Record>
    where
        P: FnMut(&Record) -> bool,
    {
        self.iter().find(|r| predicate(r))
    }

    pub fn filter<P>(&self, mut predicate: P) -> Vec<&Record>
    where
        P: FnMut(&Record) -> bool,
    {
        self.iter().filter(|r| predicate(r)).collect()
    }

    pub fn some<P>(&self, mut predicate: P) -> bool
    where
        P: FnMut(&Record) -> bool,
    {
        self.iter().any(|r| predicate(r))
    }

    pub fn every<P>(&self, mut predicate: P) -> bool
    where
        P: FnMut(&Record) -> bool,
    {
        self.iter().all(|r| predicate(r))
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Record),
    {
        self.iter().for_each(f)
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Record) -> T,
    {
        self.iter().map(f).collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn insert(&mut self, record: Record) {
        let key = record.key().to_string();
        if self.entries.insert(key.clone(), record).is_none() {
            self.keys.push(key);
        }
    }

    fn gated_insert(&mut self, record: Record) -> bool {
        if !self.entries.contains_key(record.key()) && self.entries.len() >= self.limit {
            return false;
        }
        self.insert(record);
        true
    }
}
