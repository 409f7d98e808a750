//! Record Module
//!
//! The typed value wrapper that is cached, queued and persisted.
//!
//! ## Responsibilities
//! - Tag every value with its type so it round-trips through plain JSON
//! - Coerce out-of-range integers to big integers on construction
//! - Carry the shard file currently holding the key
//! - Track TTL and absolute expiry
//!
//! Records are immutable: a mutation builds a new `Record` that replaces the
//! cached one.

mod stored;
mod value;

pub use stored::StoredRecord;
pub use value::{Value, ValueType, MAX_SAFE_INTEGER};

use std::time::Duration;

use serde_json::Value as Json;

use crate::error::Result;

/// A keyed value plus its placement and expiry metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    value: Value,
    ttl: Option<u64>,
    expires_at: Option<u64>,
    file: String,
}

impl Record {
    /// Create a record held by shard `file`
    pub fn new(key: impl Into<String>, value: impl Into<Value>, file: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into().normalize(),
            ttl: None,
            expires_at: None,
            file: file.into(),
        }
    }

    /// Attach a time-to-live counted from `now` (unix ms)
    pub fn with_ttl(mut self, ttl: Duration, now: u64) -> Self {
        let ms = ttl.as_millis() as u64;
        self.ttl = Some(ms);
        self.expires_at = Some(now.saturating_add(ms));
        self
    }

    /// Rebuild a record from a shard entry
    ///
    /// `key` is the entry's key in the shard object; it wins over the
    /// embedded `key` field.
    pub fn from_stored(key: &str, json: &Json, file: &str) -> Result<Self> {
        let stored: StoredRecord = serde_json::from_value(json.clone())?;
        let value = Value::from_json(&stored.value, stored.value_type)?;

        Ok(Self {
            key: key.to_string(),
            value,
            ttl: stored.ttl,
            expires_at: stored.expires_at,
            file: file.to_string(),
        })
    }

    pub fn to_stored(&self) -> StoredRecord {
        StoredRecord {
            key: self.key.clone(),
            value: self.value.to_json(),
            value_type: self.value.value_type(),
            ttl: self.ttl,
            expires_at: self.expires_at,
        }
    }

    /// JSON rendering written into shard files
    pub fn to_json(&self) -> Json {
        // StoredRecord only holds strings, numbers and JSON trees
        serde_json::to_value(self.to_stored()).unwrap_or(Json::Null)
    }

    /// Copy of this record placed in another shard
    pub fn relocate(&self, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..self.clone()
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// Time-to-live in milliseconds
    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    /// Absolute expiry in unix milliseconds
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Shard file currently holding this key
    pub fn file(&self) -> &str {
        &self.file
    }
}
