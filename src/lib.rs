//! # ShardKV
//!
//! An embedded, file-backed key-value store with:
//! - Tables persisted as a sequence of JSON shard files
//! - A bounded (optionally value-sorted) in-memory cache per table
//! - Debounced, batched shard rewrites
//! - Atomic temp+rename writes with crash recovery on startup
//! - Optional AES-256-CTR encryption of shards and the reference index
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                              │
//! │           (named tables, scheduler thread, events)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Table                                │
//! │                (set / get / delete / all)                    │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │BoundedCache │   │MutationQueue │   │ ReferenceIndex │
//! │  (top-N)    │   │ (debounced)  │   │ (memory/disk)  │
//! └─────────────┘   └──────┬───────┘   └────────────────┘
//!                          │
//!                          ▼
//!                   ┌─────────────┐
//!                   │ ShardStore  │
//!                   │(JSON shards)│
//!                   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use shardkv::{Config, Database, Entry};
//!
//! let config = Config::builder().path("./database").tables(["users"]).build();
//! let db = Database::open(config)?;
//! db.set("users", "alice", Entry::new(42))?;
//! assert!(db.get("users", "alice")?.is_some());
//! db.disconnect()?;
//! # Ok::<(), shardkv::ShardError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;
pub mod event;

pub mod record;
pub mod cache;
pub mod queue;
pub mod reference;
pub mod storage;
pub mod table;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cache::{BoundedCache, SortOrder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheReference, Config, ConfigBuilder};
pub use database::Database;
pub use error::{Result, ShardError};
pub use event::{Event, FlushKind};
pub use queue::QueueKind;
pub use record::{Record, Value, ValueType};
pub use table::{Entry, Query, Table};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ShardKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
