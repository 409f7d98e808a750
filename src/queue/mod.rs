//! Mutation Queue Module
//!
//! Batches per-shard mutations so many logical writes collapse into one file
//! rewrite, and keeps recently read shards around for a short window.
//!
//! ## Batches
//! - `set`: shard → key → Record (last write wins)
//! - `delete`: shard → keys
//! - `get`: shard → parsed contents (read-through cache)
//! - `all`: materialized value-sorted snapshot for full-table scans
//!
//! ## Debounce
//! The first item of a kind arms a deadline; everything queued until the
//! deadline passes is flushed together. Deadlines live here as plain unix-ms
//! values and are fired by `Table::tick()`.
//!
//! ```text
//! idle ──add──▶ accumulating ──deadline──▶ flushing ──done──▶ idle
//!                (armed)                   (in flight)
//! ```

mod mutation;

pub use mutation::{MutationQueue, Pending};

/// Independent batch kinds, each with its own debounce deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Set,
    Delete,
    Get,
    All,
}

impl QueueKind {
    /// Fixed firing order within one tick
    pub const ALL: [QueueKind; 4] = [QueueKind::Set, QueueKind::Delete, QueueKind::Get, QueueKind::All];
}
