//! On-disk form of a record
//!
//! One entry of a shard file's top-level object:
//!
//! ```text
//! "user:1": { "key": "user:1", "value": "9007199254740993", "type": "bigint",
//!             "ttl": 60000, "expiresAt": 1700000060000 }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::ValueType;

/// Serialized record as it appears inside a shard file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub key: String,

    pub value: Json,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Time-to-live in milliseconds, as given at `set`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    /// Absolute expiry (unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}
