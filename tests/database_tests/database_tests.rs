//! Tests for Database
//!
//! These tests verify:
//! - Opening creates one directory per table
//! - Configuration validation
//! - Operations are routed to the addressed table
//! - Flush on disconnect and on drop
//! - Events, ping and encryption through the facade

use std::sync::Arc;
use std::time::Duration;

use shardkv::clock::ManualClock;
use shardkv::config::{CacheReference, Config};
use shardkv::database::Database;
use shardkv::event::{Event, FlushKind};
use shardkv::record::Value;
use shardkv::table::{Entry, Query};
use shardkv::ShardError;
use tempfile::TempDir;

const KEY: &str = "0123456789abcdef0123456789abcdef";

// =============================================================================
// Helper Functions
// =============================================================================

fn config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .path(temp_dir.path())
        .tables(["users", "posts"])
        .background(false)
        .build()
}

fn open(config: Config, clock: &Arc<ManualClock>) -> Database {
    Database::open_with_clock(config, clock.clone()).unwrap()
}

fn setup() -> (TempDir, Arc<ManualClock>, Database) {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let db = open(config(&temp_dir), &clock);
    (temp_dir, clock, db)
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_table_directories() {
    let (temp_dir, _clock, db) = setup();

    assert!(db.is_ready());
    assert_eq!(db.table_names(), vec!["posts", "users"]);
    assert!(temp_dir.path().join("users").join("users_scheme_1.json").exists());
    assert!(temp_dir.path().join("posts").join("posts_scheme_1.json").exists());
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.tables, vec!["main"]);
    assert_eq!(config.extension, "json");
    assert_eq!(config.cache.limit, 5000);
    assert_eq!(config.cache.reference, CacheReference::Memory);
    assert_eq!(config.method.save_time, 100);
    assert_eq!(config.method.delete_time, 500);
    assert_eq!(config.method.get_time, 1000);
    assert_eq!(config.method.all_time, 1000);
    assert_eq!(config.store.max_data_per_file, 50_000);
    assert!(!config.encryption.enabled);
    assert!(config.scheduler.background);
}

#[test]
fn test_custom_extension() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let config = Config::builder()
        .path(temp_dir.path())
        .extension(".db")
        .background(false)
        .build();

    let db = open(config, &clock);
    db.set("main", "a", Entry::new(1)).unwrap();
    db.flush().unwrap();

    assert!(temp_dir.path().join("main").join("main_scheme_1.db").exists());
}

#[test]
fn test_invalid_configs_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let no_tables = Config::builder()
        .path(temp_dir.path())
        .tables(Vec::<String>::new())
        .build();
    assert!(matches!(Database::open(no_tables), Err(ShardError::Config(_))));

    let bad_name = Config::builder()
        .path(temp_dir.path())
        .tables(["a/b"])
        .build();
    assert!(matches!(Database::open(bad_name), Err(ShardError::Config(_))));

    let short_key = Config::builder()
        .path(temp_dir.path())
        .encryption("too-short")
        .build();
    assert!(matches!(Database::open(short_key), Err(ShardError::Config(_))));

    let zero_shard = Config::builder()
        .path(temp_dir.path())
        .max_data_per_file(0)
        .build();
    assert!(matches!(Database::open(zero_shard), Err(ShardError::Config(_))));
}

// =============================================================================
// Routing Tests
// =============================================================================

#[test]
fn test_unknown_table() {
    let (_temp, _clock, db) = setup();

    assert!(matches!(
        db.get("missing", "a"),
        Err(ShardError::UnknownTable(name)) if name == "missing"
    ));
    assert!(matches!(
        db.set("missing", "a", Entry::new(1)),
        Err(ShardError::UnknownTable(_))
    ));
    assert!(db.table("missing").is_err());
}

#[test]
fn test_tables_are_isolated() {
    let (_temp, _clock, db) = setup();

    db.set("users", "id", Entry::new("alice")).unwrap();
    db.set("posts", "id", Entry::new("hello world")).unwrap();

    assert_eq!(
        db.get("users", "id").unwrap().unwrap().value(),
        &Value::String("alice".into())
    );
    assert_eq!(
        db.get("posts", "id").unwrap().unwrap().value(),
        &Value::String("hello world".into())
    );

    assert!(db.delete("users", "id").unwrap());
    assert!(db.get("users", "id").unwrap().is_none());
    assert!(db.get("posts", "id").unwrap().is_some());
}

#[test]
fn test_bulk_set_and_all() {
    let (_temp, _clock, db) = setup();

    db.bulk_set(
        "users",
        vec![
            ("a".to_string(), Entry::new(3)),
            ("b".to_string(), Entry::new(1)),
            ("c".to_string(), Entry::new(2)),
        ],
    )
    .unwrap();

    let top = db.all("users", &Query::new().limit(2)).unwrap();
    let keys: Vec<&str> = top.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["a", "c"]);
}

#[test]
fn test_clear_only_affects_one_table() {
    let (_temp, _clock, db) = setup();
    db.set("users", "a", Entry::new(1)).unwrap();
    db.set("posts", "a", Entry::new(1)).unwrap();

    db.clear("users").unwrap();

    assert!(db.get("users", "a").unwrap().is_none());
    assert!(db.get("posts", "a").unwrap().is_some());
}

// =============================================================================
// Scheduling Tests
// =============================================================================

#[test]
fn test_tick_flushes_due_batches() {
    let (temp_dir, clock, db) = setup();
    let rx = db.subscribe();

    db.set("users", "a", Entry::new(1)).unwrap();
    clock.advance(100);
    db.tick().unwrap();

    let flushed: Vec<Event> = rx
        .try_iter()
        .filter(|e| matches!(e, Event::Flushed { .. }))
        .collect();
    assert_eq!(
        flushed,
        vec![Event::Flushed {
            table: "users".into(),
            kind: FlushKind::Set,
            shards: 1
        }]
    );

    let raw = std::fs::read_to_string(temp_dir.path().join("users").join("users_scheme_1.json")).unwrap();
    assert!(raw.contains("\"a\""));
}

#[test]
fn test_ttl_through_facade() {
    let (_temp, clock, db) = setup();

    db.set("users", "session", Entry::new("token").with_ttl(Duration::from_secs(30)))
        .unwrap();
    clock.advance(30_000);
    db.tick().unwrap();

    assert!(db.get("users", "session").unwrap().is_none());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_disconnect_flushes() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());

    let db = open(config(&temp_dir), &clock);
    db.set("users", "a", Entry::new(1)).unwrap();
    db.set("posts", "b", Entry::new(2)).unwrap();
    db.disconnect().unwrap();

    let db = open(config(&temp_dir), &clock);
    assert_eq!(db.get("users", "a").unwrap().unwrap().value(), &Value::Integer(1));
    assert_eq!(db.get("posts", "b").unwrap().unwrap().value(), &Value::Integer(2));
}

#[test]
fn test_drop_flushes() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());

    {
        let db = open(config(&temp_dir), &clock);
        db.set("users", "a", Entry::new(1)).unwrap();
        db.delete("users", "a").unwrap();
        db.set("users", "b", Entry::new(2)).unwrap();
    }

    let db = open(config(&temp_dir), &clock);
    assert!(db.get("users", "a").unwrap().is_none());
    assert!(db.get("users", "b").unwrap().is_some());
}

#[test]
fn test_encrypted_database() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::default());
    let encrypted = || {
        Config::builder()
            .path(temp_dir.path())
            .encryption(KEY)
            .cache_reference(CacheReference::Disk)
            .background(false)
            .build()
    };

    let db = open(encrypted(), &clock);
    db.set("main", "card", Entry::new("4111-1111")).unwrap();
    db.disconnect().unwrap();

    let shard = std::fs::read_to_string(temp_dir.path().join("main").join("main_scheme_1.json")).unwrap();
    let index = std::fs::read_to_string(temp_dir.path().join("main").join("$referencePath.json")).unwrap();
    assert!(!shard.contains("card"));
    assert!(!index.contains("card"));

    let db = open(encrypted(), &clock);
    assert_eq!(
        db.get("main", "card").unwrap().unwrap().value(),
        &Value::String("4111-1111".into())
    );
}

// =============================================================================
// Health Tests
// =============================================================================

#[test]
fn test_ping_every_table() {
    let (_temp, _clock, db) = setup();

    let pings = db.ping().unwrap();

    assert_eq!(pings.len(), 2);
    assert!(pings.contains_key("users"));
    assert!(db.table_ping("posts").is_ok());
    assert!(db.table_ping("missing").is_err());
}

#[test]
fn test_table_handle() {
    let (_temp, _clock, db) = setup();

    let users = db.table("users").unwrap();
    users.set("a", 1, None).unwrap();

    assert_eq!(users.name(), "users");
    assert_eq!(db.get("users", "a").unwrap().unwrap().value(), &Value::Integer(1));
}
