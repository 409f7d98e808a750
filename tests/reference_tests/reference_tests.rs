//! Tests for the reference index
//!
//! These tests verify:
//! - Memory-resident get/set/delete/size/clear
//! - Disk-resident persistence and reload
//! - Idle snapshot release (and that dirty snapshots are kept)
//! - Encrypted index files

use std::fs;
use std::sync::Arc;

use shardkv::clock::{Clock, ManualClock};
use shardkv::reference::{
    DiskReference, MemoryReference, ReferenceIndex, REFERENCE_FILENAME, SNAPSHOT_IDLE_MS,
};
use shardkv::storage::Cipher;
use tempfile::TempDir;

const KEY: &str = "0123456789abcdef0123456789abcdef";

// =============================================================================
// Helper Functions
// =============================================================================

fn exercise(index: &mut dyn ReferenceIndex) {
    assert_eq!(index.get("a").unwrap(), None);

    index.set("a", "main_scheme_1.json").unwrap();
    index.set("b", "main_scheme_2.json").unwrap();
    assert_eq!(index.get("a").unwrap().as_deref(), Some("main_scheme_1.json"));
    assert_eq!(index.size().unwrap(), 2);

    index.set("a", "main_scheme_3.json").unwrap();
    assert_eq!(index.get("a").unwrap().as_deref(), Some("main_scheme_3.json"));
    assert_eq!(index.size().unwrap(), 2);

    index.delete("a").unwrap();
    index.delete("missing").unwrap();
    assert_eq!(index.get("a").unwrap(), None);
    assert_eq!(index.size().unwrap(), 1);

    index.clear().unwrap();
    assert_eq!(index.size().unwrap(), 0);
}

fn disk(dir: &TempDir, clock: &Arc<ManualClock>, cipher: Option<Cipher>) -> DiskReference {
    DiskReference::new(dir.path(), cipher, clock.clone())
}

// =============================================================================
// Memory Reference Tests
// =============================================================================

#[test]
fn test_memory_reference_operations() {
    let mut index = MemoryReference::new();
    exercise(&mut index);
    assert!(!index.is_disk_resident());
}

// =============================================================================
// Disk Reference Tests
// =============================================================================

#[test]
fn test_disk_reference_operations() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let mut index = disk(&dir, &clock, None);

    exercise(&mut index);
    assert!(index.is_disk_resident());
}

#[test]
fn test_disk_reference_persist_and_reload() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());

    {
        let mut index = disk(&dir, &clock, None);
        index.set("a", "main_scheme_1.json").unwrap();
        index.set("b", "main_scheme_2.json").unwrap();
        index.persist().unwrap();
    }

    let path = dir.path().join(REFERENCE_FILENAME);
    let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk["a"], "main_scheme_1.json");

    let mut reloaded = disk(&dir, &clock, None);
    assert!(!reloaded.is_loaded());
    assert_eq!(reloaded.get("b").unwrap().as_deref(), Some("main_scheme_2.json"));
    assert!(reloaded.is_loaded());
    assert_eq!(reloaded.size().unwrap(), 2);
}

#[test]
fn test_disk_reference_unpersisted_changes_not_on_disk() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());

    let mut index = disk(&dir, &clock, None);
    index.set("a", "main_scheme_1.json").unwrap();

    assert!(!dir.path().join(REFERENCE_FILENAME).exists());
}

#[test]
fn test_disk_reference_drops_idle_clean_snapshot() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let mut index = disk(&dir, &clock, None);

    index.set("a", "main_scheme_1.json").unwrap();
    index.persist().unwrap();
    assert!(index.is_loaded());

    clock.advance(SNAPSHOT_IDLE_MS - 1);
    index.tick(clock.now_millis());
    assert!(index.is_loaded());

    clock.advance(1);
    index.tick(clock.now_millis());
    assert!(!index.is_loaded());

    // reloaded transparently on next access
    assert_eq!(index.get("a").unwrap().as_deref(), Some("main_scheme_1.json"));
}

#[test]
fn test_disk_reference_keeps_dirty_snapshot() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let mut index = disk(&dir, &clock, None);

    index.set("a", "main_scheme_1.json").unwrap();
    clock.advance(SNAPSHOT_IDLE_MS * 2);
    index.tick(clock.now_millis());

    assert!(index.is_loaded());
    assert_eq!(index.get("a").unwrap().as_deref(), Some("main_scheme_1.json"));
}

#[test]
fn test_disk_reference_encrypted() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let cipher = Cipher::from_security_key(KEY).unwrap();

    {
        let mut index = disk(&dir, &clock, Some(cipher.clone()));
        index.set("secret-key", "main_scheme_1.json").unwrap();
        index.persist().unwrap();
    }

    let raw = fs::read_to_string(dir.path().join(REFERENCE_FILENAME)).unwrap();
    assert!(!raw.contains("secret-key"));
    assert!(raw.contains("\"iv\""));

    let mut reloaded = disk(&dir, &clock, Some(cipher));
    assert_eq!(
        reloaded.get("secret-key").unwrap().as_deref(),
        Some("main_scheme_1.json")
    );

    // a different key cannot read it and sees an empty index
    let other = Cipher::from_security_key("ffffffffffffffffffffffffffffffff").unwrap();
    let mut wrong = disk(&dir, &clock, Some(other));
    assert_eq!(wrong.size().unwrap(), 0);
}
