//! Storage Module
//!
//! Persistent storage layer: sharded JSON files per table.
//!
//! ## Responsibilities
//! - Persist records as plain JSON objects, optionally encrypted
//! - Crash-safe rewrites (temp file + rename)
//! - Recovery from partially written files on startup
//!
//! ## Table Directory Layout
//! ```text
//! {path}/{table}/
//!   ├── {table}_scheme_1.json     shard: { key: record, ... }
//!   ├── {table}_scheme_2.json     or { "iv": hex, "data": hex } when encrypted
//!   ├── $referencePath.json       key → shard (disk-resident index only)
//!   └── $temp_{name}              only while a rewrite is in progress
//! ```

mod atomic;
mod cipher;
mod codec;
mod shard;

pub use atomic::{temp_path, write_atomic, RENAME_ATTEMPTS, TEMP_PREFIX};
pub use cipher::{Cipher, Envelope, IV_SIZE, KEY_SIZE};
pub use codec::{decode, encode};
pub use shard::ShardStore;

/// Parsed shard file: key → serialized record
pub type ShardContents = serde_json::Map<String, serde_json::Value>;
