//! Database Module
//!
//! The engine's public surface: a set of named tables sharing one
//! configuration, clock and event stream.
//!
//! ## Responsibilities
//! - Validate configuration and resolve per-table options
//! - Create and connect every table on open
//! - Route operations to the addressed table (unknown names are an error)
//! - Drive debounce deadlines from a background scheduler thread
//! - Flush everything on disconnect

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Result, ShardError};
use crate::event::{Event, EventBus};
use crate::record::Record;
use crate::table::{Entry, Query, Table};

/// An embedded database made of independent tables
///
/// ## Threading
/// Tables are shared (`Arc<Table>`) between callers and the scheduler
/// thread. The scheduler wakes every `tick_interval_ms` and calls
/// [`Table::tick`] on each table; it stops when the shutdown channel is
/// closed by [`Database::disconnect`] or `Drop`.
#[derive(Debug)]
pub struct Database {
    config: Config,

    tables: HashMap<String, Arc<Table>>,

    events: Arc<EventBus>,

    scheduler: Option<Scheduler>,

    ready: AtomicBool,
}

#[derive(Debug)]
struct Scheduler {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl Database {
    /// Open every configured table using the wall clock
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open using the default config with the given root directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::open(config)
    }

    /// Open with an injected clock (tests drive a `ManualClock`)
    ///
    /// On open:
    /// 1. Validate the config
    /// 2. Create `{path}/{table}` directories
    /// 3. `connect()` each table (loads shards, recovers rewrites)
    /// 4. Start the scheduler if enabled
    pub fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.path)?;

        let events = Arc::new(EventBus::new());
        let options = config.table_options()?;

        let mut tables = HashMap::new();
        for name in &config.tables {
            let table = Table::new(
                name.clone(),
                config.path.join(name),
                options.clone(),
                Arc::clone(&clock),
                Arc::clone(&events),
            );
            table.connect()?;
            tables.insert(name.clone(), Arc::new(table));
        }

        let mut db = Self {
            config,
            tables,
            events,
            scheduler: None,
            ready: AtomicBool::new(false),
        };

        if db.config.scheduler.background {
            db.scheduler = Some(db.spawn_scheduler()?);
        }

        db.ready.store(db.tables.values().all(|t| t.is_ready()), Ordering::SeqCst);
        tracing::info!(
            "database ready at {} ({} tables)",
            db.config.path.display(),
            db.tables.len()
        );
        db.events.emit(Event::DatabaseReady);
        Ok(db)
    }

    // =========================================================================
    // Table Operations
    // =========================================================================

    pub fn set(&self, table: &str, key: &str, entry: Entry) -> Result<Record> {
        self.table(table)?.set(key, entry.value, entry.ttl)
    }

    pub fn get(&self, table: &str, key: &str) -> Result<Option<Record>> {
        self.table(table)?.get(key)
    }

    /// Returns false when the key did not exist
    pub fn delete(&self, table: &str, key: &str) -> Result<bool> {
        self.table(table)?.delete(key)
    }

    pub fn clear(&self, table: &str) -> Result<()> {
        self.table(table)?.clear()
    }

    pub fn all(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        self.table(table)?.all(query)
    }

    pub fn bulk_set<I, K>(&self, table: &str, entries: I) -> Result<Vec<Record>>
    where
        I: IntoIterator<Item = (K, Entry)>,
        K: AsRef<str>,
    {
        self.table(table)?.bulk_set(entries)
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Result<&Arc<Table>> {
        self.tables
            .get(name)
            .ok_or_else(|| ShardError::UnknownTable(name.to_string()))
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Fire due deadlines on every table (what the scheduler thread does)
    pub fn tick(&self) -> Result<()> {
        tick_all(self.tables.values())
    }

    /// Write all queued mutations of every table now
    pub fn flush(&self) -> Result<()> {
        for table in self.tables.values() {
            table.flush()?;
        }
        Ok(())
    }

    /// Stop the scheduler and flush everything to disk
    pub fn disconnect(mut self) -> Result<()> {
        self.stop_scheduler();
        self.flush()?;
        self.ready.store(false, Ordering::SeqCst);
        tracing::info!("database at {} disconnected", self.config.path.display());
        Ok(())
    }

    // =========================================================================
    // Health & Notifications
    // =========================================================================

    /// Time to read one random shard of every table
    pub fn ping(&self) -> Result<HashMap<String, Duration>> {
        let mut pings = HashMap::with_capacity(self.tables.len());
        for (name, table) in &self.tables {
            pings.insert(name.clone(), table.ping()?);
        }
        Ok(pings)
    }

    pub fn table_ping(&self, table: &str) -> Result<Duration> {
        self.table(table)?.ping()
    }

    /// Receive readiness, flush and debug notifications
    pub fn subscribe(&self) -> Receiver<Event> {
        self.events.subscribe()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Table names, sorted
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn spawn_scheduler(&self) -> Result<Scheduler> {
        let (shutdown, signal) = channel::bounded::<()>(0);
        let tables: Vec<Arc<Table>> = self.tables.values().cloned().collect();
        let interval = Duration::from_millis(self.config.scheduler.tick_interval_ms.max(1));

        let handle = thread::Builder::new()
            .name("shardkv-scheduler".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = tick_all(tables.iter()) {
                            tracing::error!("background flush failed: {}", e);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        tracing::debug!("scheduler started ({:?} interval)", interval);
        Ok(Scheduler { shutdown, handle })
    }

    fn stop_scheduler(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            drop(scheduler.shutdown);
            if scheduler.handle.join().is_err() {
                tracing::error!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.stop_scheduler();
        if self.ready.load(Ordering::SeqCst) {
            if let Err(e) = self.flush() {
                tracing::error!("flush on drop failed: {}", e);
            }
        }
    }
}

/// Tick every table, continuing past failures; returns the first error
fn tick_all<'a>(tables: impl Iterator<Item = &'a Arc<Table>>) -> Result<()> {
    let mut outcome = Ok(());
    for table in tables {
        if let Err(e) = table.tick() {
            tracing::error!(table = table.name(), "tick failed: {}", e);
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }
    outcome
}
