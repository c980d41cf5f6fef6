use std::future::Future;

use crate::error::SyncResult;
use crate::types::{Cell, RawValue};

/// A named parameter of a lookup query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: String,
    pub value: Cell,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, value: Cell) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Tabular result of a lookup query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupResult {
    /// Column names of the result, in order.
    pub columns: Vec<String>,
    /// Result rows, each with one value per column.
    pub rows: Vec<Vec<RawValue>>,
}

/// Client executing user-supplied parameterized queries against a relational database.
///
/// Queries reference parameters as `@name`. Execution is synchronous from the caller's point of
/// view: the result is fully fetched before the future resolves.
pub trait LookupClient {
    /// Returns `false` for a client that cannot run queries at all.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Runs `sql` with `parameters` bound by name and returns the whole result.
    fn query(
        &self,
        sql: &str,
        parameters: &[QueryParameter],
    ) -> impl Future<Output = SyncResult<LookupResult>> + Send;
}
