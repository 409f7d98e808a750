//! Configuration for shardkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::cache::SortOrder;
use crate::error::{Result, ShardError};
use crate::storage::{Cipher, KEY_SIZE};

/// Main configuration for a database instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory; every table gets a sub-directory
    /// Internal structure:
    ///   {path}/
    ///     └── {table}/
    ///           ├── {table}_scheme_{n}.{extension}
    ///           └── $referencePath.json   (disk-resident index only)
    pub path: PathBuf,

    /// Shard file extension (without the dot)
    pub extension: String,

    /// Tables to open
    pub tables: Vec<String>,

    pub store: StoreOptions,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    pub cache: CacheOptions,

    // -------------------------------------------------------------------------
    // Encryption Configuration
    // -------------------------------------------------------------------------
    pub encryption: EncryptOptions,

    // -------------------------------------------------------------------------
    // Batching Configuration
    // -------------------------------------------------------------------------
    pub method: MethodOptions,

    pub scheduler: SchedulerOptions,
}

/// Where the key → shard index lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheReference {
    #[default]
    Memory,
    Disk,
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub reference: CacheReference,

    /// Keep only the top-`limit` records by value
    pub sorted: bool,

    /// Max cached records per table
    pub limit: usize,

    /// Ranking used by sorted caches
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    pub enabled: bool,

    /// 32-byte AES-256 key
    pub security_key: Option<String>,
}

/// Debounce windows (milliseconds)
#[derive(Debug, Clone, Copy)]
pub struct MethodOptions {
    /// Delay before queued sets are written
    pub save_time: u64,

    /// Delay before queued deletes are applied
    pub delete_time: u64,

    /// Lifetime of the shard read cache
    pub get_time: u64,

    /// Lifetime of the full-scan snapshot
    pub all_time: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Live keys per shard before a new shard is started
    pub max_data_per_file: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Run a background thread that fires due deadlines
    pub background: bool,

    /// Poll interval of that thread (milliseconds)
    pub tick_interval_ms: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            reference: CacheReference::Memory,
            sorted: false,
            limit: 5000,
            order: SortOrder::Desc,
        }
    }
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            save_time: 100,
            delete_time: 500,
            get_time: 1000,
            all_time: 1000,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_data_per_file: 50_000,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            background: true,
            tick_interval_ms: 25,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./database"),
            extension: "json".to_string(),
            tables: vec!["main".to_string()],
            store: StoreOptions::default(),
            cache: CacheOptions::default(),
            encryption: EncryptOptions::default(),
            method: MethodOptions::default(),
            scheduler: SchedulerOptions::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(ShardError::Config("at least one table is required".into()));
        }
        for table in &self.tables {
            if table.is_empty() || table.contains(['/', '\\']) || table.starts_with('$') {
                return Err(ShardError::Config(format!("invalid table name {:?}", table)));
            }
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\']) {
            return Err(ShardError::Config(format!(
                "invalid extension {:?}",
                self.extension
            )));
        }
        if self.store.max_data_per_file == 0 {
            return Err(ShardError::Config("max_data_per_file must be > 0".into()));
        }
        if self.cache.limit == 0 {
            return Err(ShardError::Config("cache limit must be > 0".into()));
        }
        if self.encryption.enabled {
            match &self.encryption.security_key {
                Some(key) if key.len() == KEY_SIZE => {}
                Some(key) => {
                    return Err(ShardError::Config(format!(
                        "security key must be {} bytes, got {}",
                        KEY_SIZE,
                        key.len()
                    )))
                }
                None => {
                    return Err(ShardError::Config(
                        "encryption enabled without a security key".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Resolve the cipher shared by every table, if encryption is on
    pub fn cipher(&self) -> Result<Option<Cipher>> {
        match (self.encryption.enabled, &self.encryption.security_key) {
            (true, Some(key)) => Ok(Some(Cipher::from_security_key(key)?)),
            (true, None) => Err(ShardError::Config(
                "encryption enabled without a security key".into(),
            )),
            (false, _) => Ok(None),
        }
    }

    /// Options a single table is built with
    pub fn table_options(&self) -> Result<TableOptions> {
        Ok(TableOptions {
            extension: self.extension.clone(),
            cache: self.cache.clone(),
            cipher: self.cipher()?,
            method: self.method,
            store: self.store,
        })
    }
}

/// Resolved per-table settings
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub extension: String,
    pub cache: CacheOptions,
    pub cipher: Option<Cipher>,
    pub method: MethodOptions,
    pub store: StoreOptions,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
            cache: CacheOptions::default(),
            cipher: None,
            method: MethodOptions::default(),
            store: StoreOptions::default(),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the root directory
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the shard file extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Replace the table list
    pub fn tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn cache_reference(mut self, reference: CacheReference) -> Self {
        self.config.cache.reference = reference;
        self
    }

    pub fn sorted(mut self, sorted: bool) -> Self {
        self.config.cache.sorted = sorted;
        self
    }

    pub fn cache_limit(mut self, limit: usize) -> Self {
        self.config.cache.limit = limit;
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.config.cache.order = order;
        self
    }

    /// Enable AES-256-CTR encryption with a 32-byte key
    pub fn encryption(mut self, security_key: impl Into<String>) -> Self {
        self.config.encryption = EncryptOptions {
            enabled: true,
            security_key: Some(security_key.into()),
        };
        self
    }

    pub fn save_time(mut self, ms: u64) -> Self {
        self.config.method.save_time = ms;
        self
    }

    pub fn delete_time(mut self, ms: u64) -> Self {
        self.config.method.delete_time = ms;
        self
    }

    pub fn get_time(mut self, ms: u64) -> Self {
        self.config.method.get_time = ms;
        self
    }

    pub fn all_time(mut self, ms: u64) -> Self {
        self.config.method.all_time = ms;
        self
    }

    pub fn max_data_per_file(mut self, count: usize) -> Self {
        self.config.store.max_data_per_file = count;
        self
    }

    /// Enable or disable the background scheduler thread
    pub fn background(mut self, enabled: bool) -> Self {
        self.config.scheduler.background = enabled;
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.scheduler.tick_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
