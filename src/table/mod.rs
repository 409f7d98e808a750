//! Table Module
//!
//! One keyed record set: cache, mutation queue, reference index and shards.
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                            |
//! |---------------|----------------------------------------------------|
//! | `mod.rs`      | `Table` struct, state, accessors, `tick()`/`flush()` |
//! | `write`       | `set()`, `bulk_set()`, `delete()`, shard flushes   |
//! | `read`        | `get()`, `all()`, `ping()`                         |
//! | `recovery`    | `connect()` bootstrap, `clear()`                   |
//! | `query`       | filter/limit/order for `all()`                     |
//!
//! ## Write Path
//! ```text
//! set ─▶ cache + reference ─▶ queue.set[shard] ─(save_time)─▶ rewrite shard
//! del ─▶ cache + reference ─▶ queue.delete[shard] ─(delete_time)─▶ rewrite/remove shard
//! ```
//!
//! ## Read Path
//! cache → queued mutations → shard read cache → shard file.

mod query;
mod read;
mod recovery;
mod write;

pub use query::Query;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::BoundedCache;
use crate::clock::Clock;
use crate::config::{CacheReference, TableOptions};
use crate::error::Result;
use crate::event::EventBus;
use crate::queue::{MutationQueue, QueueKind};
use crate::record::Value;
use crate::reference::{DiskReference, MemoryReference, ReferenceIndex};
use crate::storage::ShardStore;

/// Value plus optional time-to-live, as accepted by `set`
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub ttl: Option<Duration>,
}

impl Entry {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A single table of the storage engine
///
/// ## Concurrency Model
///
/// - `state`: every in-memory structure behind one mutex; held for the whole
///   of `set`/`get`/`delete`/`all`, including shard reads on a cache miss
/// - `flush_lock`: serializes flushes, `connect()` and `clear()`. A flush
///   moves its batch "in flight" under `state`, releases `state` for the
///   file I/O, then re-takes it to publish the result. Mutations arriving
///   meanwhile accumulate in a fresh batch.
/// - `ShardStore` holds a per-shard mutex around each rewrite
///
/// Lock order: `flush_lock` → `state` → shard lock.
#[derive(Debug)]
pub struct Table {
    name: String,

    options: TableOptions,

    clock: Arc<dyn Clock>,

    events: Arc<EventBus>,

    store: ShardStore,

    state: Mutex<TableState>,

    flush_lock: Mutex<()>,

    ready: AtomicBool,

    /// Unix ms of the last successful `connect()`
    ready_at: AtomicU64,
}

/// Mutable in-memory state of a table
#[derive(Debug)]
pub(crate) struct TableState {
    /// Shard filenames, oldest first; the last one receives new keys
    shards: Vec<String>,

    /// shard → live key count
    routers: HashMap<String, usize>,

    /// Index for the next shard filename
    next_index: u64,

    cache: BoundedCache,

    reference: Box<dyn ReferenceIndex>,

    queue: MutationQueue,
}

impl Table {
    /// Create a table rooted at `dir`. No I/O happens until [`connect`](Self::connect).
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        options: TableOptions,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
    ) -> Self {
        let name = name.into();
        let dir = dir.into();

        let reference: Box<dyn ReferenceIndex> = match options.cache.reference {
            CacheReference::Memory => Box::new(MemoryReference::new()),
            CacheReference::Disk => Box::new(DiskReference::new(
                &dir,
                options.cipher.clone(),
                Arc::clone(&clock),
            )),
        };

        let cache = BoundedCache::new(
            options.cache.limit,
            options.cache.sorted,
            options.cache.order,
        );

        let store = ShardStore::new(
            dir,
            name.clone(),
            options.extension.clone(),
            options.cipher.clone(),
        );

        Self {
            name,
            options,
            clock,
            events,
            store,
            state: Mutex::new(TableState {
                shards: Vec::new(),
                routers: HashMap::new(),
                next_index: 1,
                cache,
                reference,
                queue: MutationQueue::new(),
            }),
            flush_lock: Mutex::new(()),
            ready: AtomicBool::new(false),
            ready_at: AtomicU64::new(0),
        }
    }

    /// Fire every deadline that has passed
    ///
    /// Flushes due batches, drops the expired read cache and `all` snapshot,
    /// purges keys whose TTL elapsed and lets the reference index release an
    /// idle snapshot. Every step runs even if an earlier one fails; the first
    /// error is returned.
    pub fn tick(&self) -> Result<()> {
        let now = self.clock.now_millis();

        let (due, expired) = {
            let mut state = self.state.lock();
            state.reference.tick(now);
            (state.queue.take_due(now), state.queue.take_expired(now))
        };

        let mut outcome = Ok(());
        for kind in due {
            let step = match kind {
                QueueKind::Set => self.flush_sets().map(|_| ()),
                QueueKind::Delete => self.flush_deletes().map(|_| ()),
                QueueKind::Get => {
                    self.state.lock().queue.clear_read_cache();
                    Ok(())
                }
                QueueKind::All => {
                    self.state.lock().queue.clear_snapshot();
                    Ok(())
                }
            };
            if outcome.is_ok() {
                outcome = step;
            }
        }

        for key in expired {
            tracing::debug!(table = %self.name, "ttl elapsed for {}", key);
            let step = self.delete(&key).map(|_| ());
            if outcome.is_ok() {
                outcome = step;
            }
        }

        outcome
    }

    /// Write every queued set and delete now, ignoring debounce deadlines
    pub fn flush(&self) -> Result<()> {
        self.flush_sets()?;
        self.flush_deletes()?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Unix ms at which the table became ready
    pub fn ready_at(&self) -> Option<u64> {
        self.is_ready()
            .then(|| self.ready_at.load(Ordering::SeqCst))
    }

    /// Shard filenames, oldest first
    pub fn shard_names(&self) -> Vec<String> {
        self.state.lock().shards.clone()
    }

    pub fn shard_count(&self) -> usize {
        self.state.lock().shards.len()
    }

    /// Live keys routed to `shard`
    pub fn router_count(&self, shard: &str) -> usize {
        self.state.lock().routers.get(shard).copied().unwrap_or(0)
    }

    /// Number of live keys
    pub fn len(&self) -> Result<usize> {
        self.state.lock().reference.size()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn cached_len(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn pending_sets(&self) -> usize {
        self.state.lock().queue.pending_set_count()
    }

    pub fn pending_deletes(&self) -> usize {
        self.state.lock().queue.pending_delete_count()
    }

    /// Whether a batch of `kind` is armed (or, for `All`, materialized)
    pub fn is_queued(&self, kind: QueueKind) -> bool {
        self.state.lock().queue.is_queued(kind)
    }

    pub fn shard_path(&self, shard: &str) -> PathBuf {
        self.store.path(shard)
    }
}
