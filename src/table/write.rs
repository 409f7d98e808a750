//! Write path: `set()`, `bulk_set()`, `delete()` and the shard flushes.

use std::time::Duration;

use crate::error::Result;
use crate::event::{Event, FlushKind};
use crate::queue::QueueKind;
use crate::record::{Record, Value};
use crate::storage::ShardStore;

use super::{Entry, Table, TableState};

impl Table {
    /// Insert or replace `key`
    ///
    /// The cache is updated before returning, so a following `get` sees the
    /// new value; the shard rewrite happens `save_time` ms after the first
    /// queued set.
    pub fn set(
        &self,
        key: &str,
        value: impl Into<Value>,
        ttl: Option<Duration>,
    ) -> Result<Record> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        self.set_locked(&mut state, key, value.into(), ttl, now)
    }

    /// `set()` for many entries under a single lock acquisition
    pub fn bulk_set<I, K>(&self, entries: I) -> Result<Vec<Record>>
    where
        I: IntoIterator<Item = (K, Entry)>,
        K: AsRef<str>,
    {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        entries
            .into_iter()
            .map(|(key, entry)| self.set_locked(&mut state, key.as_ref(), entry.value, entry.ttl, now))
            .collect()
    }

    /// Remove `key`. Returns false when the key was not found.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        let shard = match state.reference.get(key)? {
            Some(shard) => Some(shard),
            None => state.cache.get(key).map(|r| r.file().to_string()),
        };
        let shard = match shard {
            Some(shard) => shard,
            None => match self.get_locked(&mut state, key, now)? {
                Some(record) => record.file().to_string(),
                None => return Ok(false),
            },
        };

        state.delete_locked(key, &shard, now, self.options.method.delete_time)?;
        self.events.debug(&self.name, format!("queued delete of {} in {}", key, shard));
        Ok(true)
    }

    fn set_locked(
        &self,
        state: &mut TableState,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        now: u64,
    ) -> Result<Record> {
        let cached_shard = state.cache.get(key).map(|r| r.file().to_string());
        let shard = match cached_shard {
            Some(shard) => shard,
            None => match state.reference.get(key)? {
                Some(shard) => shard,
                None => {
                    let shard = state.current_shard(&self.store, self.options.store.max_data_per_file)?;
                    *state.routers.entry(shard.clone()).or_insert(0) += 1;
                    shard
                }
            },
        };

        let mut record = Record::new(key, value, shard.as_str());
        if let Some(ttl) = ttl {
            record = record.with_ttl(ttl, now);
        }

        state.cache.set(record.clone());
        state.reference.set(key, &shard)?;
        if let Some(snapshot) = state.queue.snapshot_mut() {
            snapshot.set(record.clone());
        }
        match record.expires_at() {
            Some(at) => state.queue.schedule_expiry(key, at),
            None => state.queue.cancel_expiry(key),
        }

        state.queue.add_set(record.clone());
        if state.queue.arm(QueueKind::Set, now, self.options.method.save_time) {
            self.events.debug(
                &self.name,
                format!("save timer armed for {} ms", self.options.method.save_time),
            );
        }

        Ok(record)
    }

    /// Merge the queued upserts into their shards
    ///
    /// Returns the number of shards rewritten. On failure the unwritten
    /// records go back into the queue and the save timer is re-armed.
    pub(crate) fn flush_sets(&self) -> Result<usize> {
        let _flush = self.flush_lock.lock();

        let batch = {
            let mut state = self.state.lock();
            state.queue.disarm(QueueKind::Set);
            state.queue.begin_set_flush()
        };

        let mut written = 0;
        let mut failure = None;
        for (shard, records) in batch.iter() {
            let outcome = self.store.update(shard, |contents| {
                for (key, record) in records {
                    contents.insert(key.clone(), record.to_json());
                }
            });
            match outcome {
                Ok(_) => written += 1,
                Err(e) => {
                    tracing::error!(table = %self.name, "flushing sets into {} failed: {}", shard, e);
                    failure = Some(e);
                    break;
                }
            }
        }

        let mut state = self.state.lock();
        state.queue.finish_set_flush();

        if let Some(e) = failure {
            for record in batch.values().flat_map(|records| records.values()) {
                state.queue.requeue_set(record.clone());
            }
            state
                .queue
                .arm(QueueKind::Set, self.clock.now_millis(), self.options.method.save_time);
            return Err(e);
        }

        state.reference.persist()?;
        drop(state);

        if written > 0 {
            tracing::debug!(table = %self.name, "flushed sets into {} shard(s)", written);
            self.events.emit(Event::Flushed {
                table: self.name.clone(),
                kind: FlushKind::Set,
                shards: written,
            });
        }
        Ok(written)
    }

    /// Drop the queued keys from their shards
    ///
    /// A shard left empty is deleted from disk, unless it is the table's only
    /// shard or keys have been routed to it meanwhile.
    pub(crate) fn flush_deletes(&self) -> Result<usize> {
        let _flush = self.flush_lock.lock();

        let batch = {
            let mut state = self.state.lock();
            state.queue.disarm(QueueKind::Delete);
            state.queue.begin_delete_flush()
        };

        let mut written = 0;
        let mut emptied = Vec::new();
        let mut failure = None;
        for (shard, keys) in batch.iter() {
            let outcome = self.store.update(shard, |contents| {
                for key in keys {
                    contents.remove(key);
                }
            });
            match outcome {
                Ok(remaining) => {
                    written += 1;
                    if remaining == 0 {
                        emptied.push(shard.clone());
                    }
                }
                Err(e) => {
                    tracing::error!(table = %self.name, "flushing deletes from {} failed: {}", shard, e);
                    failure = Some(e);
                    break;
                }
            }
        }

        let mut state = self.state.lock();
        state.queue.finish_delete_flush();

        if let Some(e) = failure {
            for (shard, keys) in batch.iter() {
                for key in keys {
                    state.queue.requeue_delete(shard, key);
                }
            }
            state.queue.arm(
                QueueKind::Delete,
                self.clock.now_millis(),
                self.options.method.delete_time,
            );
            return Err(e);
        }

        for shard in emptied {
            if state.shards.len() <= 1
                || state.routers.get(&shard).copied().unwrap_or(0) > 0
                || state.queue.has_pending_sets(&shard)
            {
                continue;
            }
            self.store.remove(&shard)?;
            state.shards.retain(|s| s != &shard);
            state.routers.remove(&shard);
            state.queue.delete_path_from_queue(&shard);
            tracing::debug!(table = %self.name, "removed empty shard {}", shard);
        }

        state.reference.persist()?;
        drop(state);

        if written > 0 {
            tracing::debug!(table = %self.name, "flushed deletes from {} shard(s)", written);
            self.events.emit(Event::Flushed {
                table: self.name.clone(),
                kind: FlushKind::Delete,
                shards: written,
            });
        }
        Ok(written)
    }
}

impl TableState {
    /// Shard receiving new keys, rolling over to a fresh one when full
    pub(crate) fn current_shard(&mut self, store: &ShardStore, max_data_per_file: usize) -> Result<String> {
        if let Some(last) = self.shards.last() {
            if self.routers.get(last).copied().unwrap_or(0) < max_data_per_file {
                return Ok(last.clone());
            }
        }

        let name = store.shard_name(self.next_index);
        self.next_index += 1;
        store.create_empty(&name)?;
        self.shards.push(name.clone());
        self.routers.insert(name.clone(), 0);
        tracing::debug!("started shard {}", name);
        Ok(name)
    }

    /// Forget `key` everywhere in memory and queue its removal from `shard`
    pub(crate) fn delete_locked(
        &mut self,
        key: &str,
        shard: &str,
        now: u64,
        delete_time: u64,
    ) -> Result<()> {
        self.cache.delete(key);
        self.reference.delete(key)?;
        if let Some(snapshot) = self.queue.snapshot_mut() {
            snapshot.delete(key);
        }
        self.queue.cancel_expiry(key);
        self.queue.add_delete(shard, key);
        if let Some(count) = self.routers.get_mut(shard) {
            *count = count.saturating_sub(1);
        }
        self.queue.arm(QueueKind::Delete, now, delete_time);
        Ok(())
    }
}
