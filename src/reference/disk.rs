//! Disk-resident reference index
//!
//! The index lives in `$referencePath.json` (encrypted like shards when the
//! table is). A snapshot is loaded on first access and kept while it is in
//! use; once it has been clean and idle for [`SNAPSHOT_IDLE_MS`] it is
//! dropped, bounding memory for large, rarely updated tables.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{self, Cipher, ShardContents};

use super::ReferenceIndex;

/// Name of the index file inside the table directory
pub const REFERENCE_FILENAME: &str = "$referencePath.json";

/// Idle time before a clean snapshot is discarded
pub const SNAPSHOT_IDLE_MS: u64 = 5_000;

#[derive(Debug)]
pub struct DiskReference {
    path: PathBuf,
    cipher: Option<Cipher>,
    clock: Arc<dyn Clock>,

    /// Loaded copy of the file, if any
    snapshot: Option<HashMap<String, String>>,

    /// Snapshot holds changes not yet persisted
    dirty: bool,

    last_access: u64,
}

impl DiskReference {
    pub fn new(dir: &Path, cipher: Option<Cipher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: dir.join(REFERENCE_FILENAME),
            cipher,
            clock,
            snapshot: None,
            dirty: false,
            last_access: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot is currently held in memory
    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    fn snapshot(&mut self) -> Result<&mut HashMap<String, String>> {
        self.last_access = self.clock.now_millis();
        if self.snapshot.is_none() {
            let loaded = self.load()?;
            tracing::debug!("loaded reference index ({} keys)", loaded.len());
            self.snapshot = Some(loaded);
        }
        Ok(self.snapshot.get_or_insert_with(HashMap::new))
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let contents = storage::decode(&bytes, self.cipher.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("unreadable reference index treated as empty: {}", e);
            ShardContents::new()
        });

        Ok(contents
            .into_iter()
            .filter_map(|(key, shard)| match shard {
                Json::String(shard) => Some((key, shard)),
                _ => None,
            })
            .collect())
    }
}

impl ReferenceIndex for DiskReference {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.snapshot()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, shard: &str) -> Result<()> {
        let map = self.snapshot()?;
        if map.get(key).map(String::as_str) != Some(shard) {
            map.insert(key.to_string(), shard.to_string());
            self.dirty = true;
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.snapshot()?.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn size(&mut self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.snapshot = Some(HashMap::new());
        self.dirty = true;
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(map) = self.snapshot.as_ref() else {
            return Ok(());
        };

        let contents: ShardContents = map
            .iter()
            .map(|(key, shard)| (key.clone(), Json::String(shard.clone())))
            .collect();
        let bytes = storage::encode(&contents, self.cipher.as_ref())?;
        storage::write_atomic(&self.path, &bytes)?;

        self.dirty = false;
        tracing::debug!("persisted reference index ({} keys)", contents.len());
        Ok(())
    }

    fn tick(&mut self, now: u64) {
        if self.snapshot.is_some()
            && !self.dirty
            && now.saturating_sub(self.last_access) >= SNAPSHOT_IDLE_MS
        {
            tracing::debug!("dropping idle reference snapshot");
            self.snapshot = None;
        }
    }

    fn is_disk_resident(&self) -> bool {
        true
    }
}
