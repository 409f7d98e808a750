//! Parameters of an `all()` scan

use std::fmt;
use std::sync::Arc;

use crate::cache::SortOrder;
use crate::record::Record;

type Filter = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Default number of records returned by `all()`
pub const DEFAULT_LIMIT: usize = 10;

/// Filter, limit and order for [`Table::all`](super::Table::all)
///
/// ```
/// use shardkv::table::Query;
/// use shardkv::cache::SortOrder;
///
/// let query = Query::new()
///     .filter(|r| r.key().starts_with("user:"))
///     .limit(2)
///     .order(SortOrder::Asc);
/// assert_eq!(query.get_limit(), 2);
/// ```
#[derive(Clone)]
pub struct Query {
    filter: Option<Filter>,
    limit: usize,
    order: SortOrder,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only records matching `predicate`
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(predicate));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn get_limit(&self) -> usize {
        self.limit
    }

    pub fn get_order(&self) -> SortOrder {
        self.order
    }

    /// Shape a descending-sorted list into the query result
    pub(crate) fn apply(&self, ranked: Vec<Record>, now: u64) -> Vec<Record> {
        let mut records: Vec<Record> = ranked
            .into_iter()
            .filter(|r| !r.is_expired(now))
            .filter(|r| self.filter.as_ref().map_or(true, |f| f(r)))
            .collect();

        if self.order == SortOrder::Asc {
            records.reverse();
        }
        records.truncate(self.limit);
        records
    }
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filter: None,
            limit: DEFAULT_LIMIT,
            order: SortOrder::Desc,
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter.is_some())
            .field("limit", &self.limit)
            .field("order", &self.order)
            .finish()
    }
}
