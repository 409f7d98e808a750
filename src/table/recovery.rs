//! Cold start and reset: `connect()` and `clear()`.
//!
//! On connect every shard is loaded (resolving interrupted rewrites), each
//! key is placed in the cache and reference index, and TTLs are
//! rescheduled. Keys that expired while the process was down are purged.

use std::sync::atomic::Ordering;

use crate::error::Result;
use crate::event::Event;
use crate::queue::QueueKind;
use crate::record::Record;

use super::Table;

impl Table {
    /// Load the table from disk and mark it ready
    ///
    /// Returns the number of live records loaded. Safe to call again; the
    /// in-memory state is rebuilt from scratch.
    pub fn connect(&self) -> Result<usize> {
        let _flush = self.flush_lock.lock();
        let now = self.clock.now_millis();
        self.ready.store(false, Ordering::SeqCst);

        self.store.ensure_dir()?;
        let mut shards = self.store.discover()?;
        if shards.is_empty() {
            let first = self.store.shard_name(1);
            self.store.create_empty(&first)?;
            shards.push(first);
        }

        let mut state = self.state.lock();
        state.cache.clear();
        state.queue.clear();
        state.reference.clear()?;
        state.routers.clear();
        state.next_index = shards
            .iter()
            .filter_map(|s| self.store.parse_index(s))
            .max()
            .unwrap_or(0)
            + 1;
        state.shards = shards.clone();

        let mut stale = Vec::new();

        for shard in &shards {
            let contents = self.store.recover(shard)?;
            state.routers.insert(shard.clone(), 0);

            for (key, json) in contents.iter() {
                let record = match Record::from_stored(key, json, shard) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(table = %self.name, "skipping malformed {} in {}: {}", key, shard, e);
                        continue;
                    }
                };

                *state.routers.entry(shard.clone()).or_insert(0) += 1;

                // Same key in an older shard: the later shard wins
                if let Some(older) = state.reference.get(key)? {
                    state.cache.delete(key);
                    stale.push((key.clone(), older));
                }
                state.reference.set(key, shard)?;

                if record.is_expired(now) {
                    stale.push((key.clone(), shard.clone()));
                    continue;
                }
                if let Some(at) = record.expires_at() {
                    state.queue.schedule_expiry(key, at);
                }
                state.cache.manual_set(record);
            }
        }

        for (key, shard) in stale {
            if state.reference.get(&key)?.as_deref() == Some(shard.as_str()) {
                // expired while the process was down
                state.delete_locked(&key, &shard, now, self.options.method.delete_time)?;
            } else {
                state.queue.add_delete(&shard, &key);
                if let Some(count) = state.routers.get_mut(&shard) {
                    *count = count.saturating_sub(1);
                }
                state
                    .queue
                    .arm(QueueKind::Delete, now, self.options.method.delete_time);
            }
        }

        if state.cache.is_sorted() {
            state.cache.sort();
        }
        state.reference.persist()?;
        let loaded = state.reference.size()?;
        drop(state);

        self.ready_at.store(now, Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(table = %self.name, "table ready: {} records in {} shard(s)", loaded, shards.len());
        self.events.emit(Event::TableReady {
            table: self.name.clone(),
            loaded,
        });
        Ok(loaded)
    }

    /// Wipe the table: memory, queue, index and every shard file
    ///
    /// Leaves exactly one empty shard behind.
    pub fn clear(&self) -> Result<()> {
        let _flush = self.flush_lock.lock();
        let mut state = self.state.lock();

        state.cache.clear();
        state.queue.clear();

        self.store.reset()?;
        let first = self.store.shard_name(1);
        self.store.create_empty(&first)?;

        state.shards = vec![first.clone()];
        state.routers.clear();
        state.routers.insert(first, 0);
        state.next_index = 2;
        state.reference.clear()?;

        tracing::info!(table = %self.name, "table cleared");
        Ok(())
    }
}
