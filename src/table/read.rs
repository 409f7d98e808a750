//! Read path: `get()`, `all()` and `ping()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;

use crate::cache::{BoundedCache, SortOrder};
use crate::error::Result;
use crate::queue::{Pending, QueueKind};
use crate::record::Record;

use super::{Query, Table, TableState};

impl Table {
    /// Look up `key`. `Ok(None)` means not found.
    ///
    /// Search order:
    /// 1. Cache
    /// 2. Queued (or in-flight) mutations of the key's shard
    /// 3. Shard read cache, else the shard file (which then gets cached for
    ///    `get_time` ms)
    pub fn get(&self, key: &str) -> Result<Option<Record>> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        self.get_locked(&mut state, key, now)
    }

    pub(crate) fn get_locked(
        &self,
        state: &mut TableState,
        key: &str,
        now: u64,
    ) -> Result<Option<Record>> {
        if let Some(cached) = state.cache.get(key) {
            if !cached.is_expired(now) {
                return Ok(Some(cached.clone()));
            }
            let shard = cached.file().to_string();
            state.delete_locked(key, &shard, now, self.options.method.delete_time)?;
            return Ok(None);
        }

        let Some(shard) = state.reference.get(key)? else {
            return Ok(None);
        };

        let queued = match state.queue.pending(&shard, key) {
            Pending::Set(record) => Some(Some(record.clone())),
            Pending::Deleted => Some(None),
            Pending::None => None,
        };

        let found = match queued {
            Some(found) => found,
            None => {
                let contents = match state.queue.cached_shard(&shard) {
                    Some(contents) => contents,
                    None => {
                        let contents = Arc::new(self.store.read(&shard)?);
                        state.queue.cache_shard(&shard, Arc::clone(&contents));
                        state.queue.arm(QueueKind::Get, now, self.options.method.get_time);
                        contents
                    }
                };

                match contents.get(key) {
                    Some(json) => match Record::from_stored(key, json, &shard) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::warn!(table = %self.name, "skipping malformed {} in {}: {}", key, shard, e);
                            None
                        }
                    },
                    None => None,
                }
            }
        };

        match found {
            Some(record) if record.is_expired(now) => {
                state.delete_locked(key, &shard, now, self.options.method.delete_time)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Scan the table, ranked by value
    ///
    /// Small tables whose keys are all cached are served from the cache.
    /// Otherwise every shard is read once into a sorted snapshot that is
    /// reused for `all_time` ms (and kept current by later writes).
    pub fn all(&self, query: &Query) -> Result<Vec<Record>> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        if state.queue.snapshot().is_none() {
            let size = state.reference.size()?;
            let fits = size <= state.cache.limit()
                && size <= self.options.store.max_data_per_file
                && state.cache.len() == size;

            if fits {
                let mut ranked: Vec<Record> = state.cache.iter().cloned().collect();
                ranked.sort_by(|a, b| SortOrder::Desc.compare(a.value(), b.value()));
                return Ok(query.apply(ranked, now));
            }

            let snapshot = self.scan(&mut state)?;
            tracing::debug!(table = %self.name, "materialized {} records for all()", snapshot.len());
            state.queue.set_snapshot(snapshot);
            state.queue.arm(QueueKind::All, now, self.options.method.all_time);
        }

        let ranked: Vec<Record> = state
            .queue
            .snapshot()
            .map(|snapshot| snapshot.iter().cloned().collect())
            .unwrap_or_default();
        Ok(query.apply(ranked, now))
    }

    /// Read every shard, overlaying queued mutations
    fn scan(&self, state: &mut TableState) -> Result<BoundedCache> {
        let mut snapshot = BoundedCache::new(usize::MAX, true, SortOrder::Desc);

        for shard in state.shards.clone() {
            let contents = match state.queue.cached_shard(&shard) {
                Some(contents) => contents,
                None => Arc::new(self.store.read(&shard)?),
            };

            for (key, json) in contents.iter() {
                if state.queue.pending(&shard, key) != Pending::None {
                    continue;
                }
                match Record::from_stored(key, json, &shard) {
                    Ok(record) => {
                        snapshot.manual_set(record);
                    }
                    Err(e) => {
                        tracing::warn!(table = %self.name, "skipping malformed {} in {}: {}", key, shard, e);
                    }
                }
            }

            for record in state.queue.pending_sets_for(&shard) {
                snapshot.manual_set(record.clone());
            }
        }

        snapshot.sort();
        Ok(snapshot)
    }

    /// Read one random shard and report how long it took
    pub fn ping(&self) -> Result<Duration> {
        let shard = {
            let state = self.state.lock();
            state.shards.choose(&mut rand::thread_rng()).cloned()
        };

        let started = Instant::now();
        if let Some(shard) = shard {
            self.store.read(&shard)?;
        }
        Ok(started.elapsed())
    }
}
