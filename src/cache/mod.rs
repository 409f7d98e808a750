//! Cache Module
//!
//! Bounded, ordered in-memory view of a table's records.
//!
//! ## Responsibilities
//! - Serve reads without touching shard files
//! - Cap memory with a fixed entry limit
//! - Optionally keep only the top-N records by value
//!
//! ## Capacity Policy
//! An unsorted cache is a capacity *gate*: once full it refuses new keys and
//! keeps what it already holds (no recency eviction). A sorted cache accepts
//! every insert, re-sorts by value and drops the lowest-ranked overflow.

mod bounded;

pub use bounded::BoundedCache;

use std::cmp::Ordering;

use crate::record::Value;

/// Direction for value-sorted views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Compare two values so that the first-ranked sorts first
    pub fn compare(self, a: &Value, b: &Value) -> Ordering {
        match self {
            SortOrder::Asc => a.compare(b),
            SortOrder::Desc => b.compare(a),
        }
    }
}
