//! Atomic file rewrite
//!
//! Write to `$temp_<name>`, fsync, then rename over the original. If the
//! rename fails (common on Windows while the target is still held open) the
//! original is removed and the rename retried, up to [`RENAME_ATTEMPTS`].
//! After a failed retry the latest contents live only in `$temp_<name>`;
//! `ShardStore` reads, discovers and restores such orphans.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{Result, ShardError};

/// Prefix of in-progress rewrite files
pub const TEMP_PREFIX: &str = "$temp_";

pub const RENAME_ATTEMPTS: u32 = 3;

const RENAME_BACKOFF: Duration = Duration::from_millis(10);

/// `dir/$temp_<name>` for `dir/<name>`
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", TEMP_PREFIX, name))
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);

    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match fs::rename(&tmp, path) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < RENAME_ATTEMPTS => {
                tracing::warn!(
                    "rename {} -> {} failed (attempt {}): {}",
                    tmp.display(),
                    path.display(),
                    attempt,
                    e
                );
                if path.exists() {
                    let _ = fs::remove_file(path);
                }
                thread::sleep(RENAME_BACKOFF);
            }
            Err(e) => {
                tracing::error!("giving up on {}: {}", path.display(), e);
                return Err(ShardError::WriteFailed {
                    path: path.to_path_buf(),
                    attempts: attempt,
                });
            }
        }
    }
}
