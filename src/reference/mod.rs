//! Reference Index Module
//!
//! key → shard file lookup, so `get` never scans every shard.
//!
//! Two residencies, chosen at table construction:
//! - [`MemoryReference`]: a plain map living as long as the table
//! - [`DiskReference`]: persisted to `$referencePath.json`, loaded into a
//!   temporary snapshot on demand and dropped after a few idle seconds
//!
//! Exactly one entry exists per live key; a miss means "not found".

mod disk;
mod memory;

pub use disk::{DiskReference, REFERENCE_FILENAME, SNAPSHOT_IDLE_MS};
pub use memory::MemoryReference;

use crate::error::Result;

/// Key → shard lookup table
pub trait ReferenceIndex: Send + std::fmt::Debug {
    /// Shard holding `key`
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, shard: &str) -> Result<()>;

    fn delete(&mut self, key: &str) -> Result<()>;

    /// Number of live keys
    fn size(&mut self) -> Result<usize>;

    fn clear(&mut self) -> Result<()>;

    /// Write pending changes to disk (no-op when memory-resident)
    fn persist(&mut self) -> Result<()>;

    /// Release idle resources
    fn tick(&mut self, _now: u64) {}

    fn is_disk_resident(&self) -> bool;
}
