//! Shard Store
//!
//! Owns the shard files of one table directory.
//!
//! ## Responsibilities
//! - Name and discover `<table>_scheme_<n>.<ext>` files
//! - Read + decrypt shards (bad payloads read as empty)
//! - Rewrite shards atomically, one writer per shard at a time
//! - Resolve interrupted rewrites on startup

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

use super::atomic::{temp_path, write_atomic, TEMP_PREFIX};
use super::cipher::Cipher;
use super::{codec, ShardContents};

/// File-level access to a table's shards
///
/// ## Concurrency:
/// - `locks`: one mutex per shard name, held across read-modify-write and
///   removal so two flushes never rewrite the same shard concurrently
/// - Plain reads take no lock; the final rename is atomic
#[derive(Debug)]
pub struct ShardStore {
    /// Table directory
    dir: PathBuf,

    table: String,

    /// Shard file extension (without the dot)
    extension: String,

    cipher: Option<Cipher>,

    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ShardStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        table: impl Into<String>,
        extension: impl Into<String>,
        cipher: Option<Cipher>,
    ) -> Self {
        Self {
            dir: dir.into(),
            table: table.into(),
            extension: extension.into(),
            cipher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create the table directory if it does not exist
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Discover shard files on disk, ordered by index
    ///
    /// A shard whose rewrite was cut short after the original was removed
    /// exists only as `$temp_<name>`; it is listed under `<name>`.
    pub fn discover(&self) -> Result<Vec<String>> {
        let mut found: Vec<(u64, String)> = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = file_name
                .strip_prefix(TEMP_PREFIX)
                .unwrap_or(file_name.as_str())
                .to_string();
            if let Some(index) = self.parse_index(&name) {
                found.push((index, name));
            }
        }

        found.sort();
        found.dedup();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    /// Read a shard. Undecodable payloads read as empty.
    ///
    /// When the shard file is missing its `$temp_` file is read instead, so
    /// a rewrite that failed after removing the original loses nothing.
    pub fn read(&self, name: &str) -> Result<ShardContents> {
        let path = self.path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => match fs::read(temp_path(&path)) {
                Ok(bytes) => {
                    tracing::warn!("{}: missing, reading its temp file", name);
                    bytes
                }
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ShardContents::new()),
                Err(e) => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        };
        Ok(self.decode_or_empty(name, &bytes))
    }

    /// Atomically replace a shard's contents
    pub fn write(&self, name: &str, contents: &ShardContents) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock();
        self.write_unlocked(name, contents)
    }

    /// Read-modify-write under the shard's lock. Returns the entry count
    /// after `apply`.
    pub fn update<F>(&self, name: &str, apply: F) -> Result<usize>
    where
        F: FnOnce(&mut ShardContents),
    {
        let lock = self.lock_for(name);
        let _guard = lock.lock();

        self.restore_orphan(name);
        let mut contents = self.read(name)?;
        apply(&mut contents);
        self.write_unlocked(name, &contents)?;
        Ok(contents.len())
    }

    /// Write an empty shard unless the shard or its temp file already exists
    pub fn create_empty(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if path.exists() || temp_path(&path).exists() {
            return Ok(());
        }
        self.write(name, &ShardContents::new())
    }

    /// Delete a shard file and any stray temp file beside it
    pub fn remove(&self, name: &str) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock();

        let path = self.path(name);
        for target in [temp_path(&path), path] {
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        drop(_guard);
        self.locks.lock().remove(name);
        Ok(())
    }

    /// Load a shard on startup, resolving an interrupted rewrite.
    ///
    /// When `$temp_<name>` survives a crash, the larger of the two files is
    /// taken as the more complete write. This is a heuristic: a truncated
    /// temp file can still be the longer one. An undecodable winner loads as
    /// an empty shard. The chosen contents are rewritten in place and the
    /// temp file disappears.
    pub fn recover(&self, name: &str) -> Result<ShardContents> {
        let path = self.path(name);
        let tmp = temp_path(&path);

        let tmp_len = match fs::metadata(&tmp) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return self.read(name),
            Err(e) => return Err(e.into()),
        };
        let real_len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        if tmp_len > real_len {
            tracing::warn!(
                "{}: recovering from interrupted rewrite ({} > {} bytes)",
                name,
                tmp_len,
                real_len
            );
            let bytes = fs::read(&tmp)?;
            let contents = self.decode_or_empty(name, &bytes);
            self.write(name, &contents)?;
            Ok(contents)
        } else {
            tracing::debug!("{}: discarding stale temp file", name);
            fs::remove_file(&tmp)?;
            self.read(name)
        }
    }

    /// Delete and recreate the table directory
    pub fn reset(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.locks.lock().clear();
        self.ensure_dir()
    }

    // =========================================================================
    // Naming
    // =========================================================================

    /// "main", 3 → "main_scheme_3.json"
    pub fn shard_name(&self, index: u64) -> String {
        format!("{}_scheme_{}.{}", self.table, index, self.extension)
    }

    /// "main_scheme_3.json" → Some(3)
    pub fn parse_index(&self, name: &str) -> Option<u64> {
        if name.starts_with(TEMP_PREFIX) {
            return None;
        }
        let stem = name.strip_suffix(&format!(".{}", self.extension))?;
        let index = stem.strip_prefix(&format!("{}_scheme_", self.table))?;
        index.parse().ok()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_unlocked(&self, name: &str, contents: &ShardContents) -> Result<()> {
        let bytes = codec::encode(contents, self.cipher.as_ref())?;
        write_atomic(&self.path(name), &bytes)
    }

    /// Move an orphaned `$temp_<name>` back into place before it is reused
    fn restore_orphan(&self, name: &str) {
        let path = self.path(name);
        let tmp = temp_path(&path);
        if path.exists() || !tmp.exists() {
            return;
        }
        match fs::rename(&tmp, &path) {
            Ok(()) => tracing::warn!("{}: restored from orphaned temp file", name),
            Err(e) => tracing::warn!("{}: could not restore temp file: {}", name, e),
        }
    }

    fn decode_or_empty(&self, name: &str, bytes: &[u8]) -> ShardContents {
        codec::decode(bytes, self.cipher.as_ref()).unwrap_or_else(|e| {
            tracing::warn!("{}: unreadable payload treated as empty shard: {}", name, e);
            ShardContents::new()
        })
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(name.to_string()).or_default())
    }
}
