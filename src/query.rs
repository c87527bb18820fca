//! Query contract
//!
//! The query object is supplied by a storage engine and consumed here
//! through the [`RecordQuery`] trait: filtered fetch, alias management, and
//! batched or streamed iteration. The crate adds the condition-naming
//! plumbing and the primary-key shortcut on top, but never builds SQL.

use crate::condition::QueryConditionBuilder;
use crate::record::RecordRef;
use crate::value::AttrValue;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a storage-bound query.
pub type QueryRef = Rc<RefCell<dyn RecordQuery>>;

/// Error reported by a query while executing against its storage engine.
#[derive(Debug, Clone)]
pub enum QueryError {
    /// The storage engine failed to execute the query.
    Execution(String),
    /// The query does not support the requested operation.
    Unsupported(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Execution(s) => write!(f, "query execution error: {s}"),
            QueryError::Unsupported(s) => write!(f, "unsupported query operation: {s}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// One row produced by a query.
///
/// Queries normally yield records; a query switched to projection mode with
/// [`RecordQuery::as_array`] yields plain rows instead, and those pass
/// through the entity-conversion layers unconverted.
#[derive(Clone)]
pub enum QueryResult {
    /// A full record satisfying the [`Record`](crate::record::Record) contract.
    Record(RecordRef),
    /// An array-shaped projection row.
    Row(AttrValue),
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Record(_) => f.write_str("Record(..)"),
            QueryResult::Row(v) => f.debug_tuple("Row").field(v).finish(),
        }
    }
}

/// How a cursor steps through its result set.
///
/// The two modes are distinct contracts, not one adapter with an inferred
/// flag: `Streamed` hands over one row per step, `Batched` hands over one
/// page of rows per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationMode {
    /// One row per step (`each`-style iteration).
    Streamed,
    /// One page of rows per step (`batch`-style iteration).
    Batched,
}

/// The value under a cursor at its current position.
#[derive(Clone, Debug)]
pub enum CursorItem {
    /// Current row of a [`IterationMode::Streamed`] cursor.
    One(QueryResult),
    /// Current page of a [`IterationMode::Batched`] cursor.
    Page(Vec<QueryResult>),
}

/// Forward-only cursor over a query's result set.
///
/// The shape follows the classic external-iterator contract (`rewind`,
/// `valid`, `current`, `next`, `key`) so engine-side batch cursors map onto
/// it directly. [`SearchResult`](crate::search_result::SearchResult) wraps
/// this and converts rows to entities.
pub trait QueryCursor {
    fn mode(&self) -> IterationMode;

    /// Reset the cursor to the first position.
    fn rewind(&mut self);

    /// Whether the current position holds data.
    fn valid(&self) -> bool;

    /// The item at the current position, `None` once exhausted.
    fn current(&self) -> Option<CursorItem>;

    /// Advance to the next position.
    fn next(&mut self);

    /// Zero-based index of the current position.
    fn key(&self) -> usize;
}

/// The contract a storage engine's query must satisfy.
///
/// Builder-style methods mutate the query in place; the
/// [`Finder`](crate::finder::Finder) layers a fluent `self`-returning chain
/// over them. Conditions are plain strings with named bind parameters
/// produced by the query's [`QueryConditionBuilder`], which guarantees that
/// repeated condition helpers never collide.
pub trait RecordQuery {
    /// Current table alias. Defaults to the main table name.
    fn alias(&self) -> String;

    /// Re-alias the query. Implementations must keep their condition
    /// builder's default alias in sync.
    fn set_alias(&mut self, alias: &str);

    fn main_table_name(&self) -> String;

    /// Name of the primary key column.
    fn primary_key_name(&self) -> String {
        "id".to_string()
    }

    /// The condition builder scoped to this query.
    fn condition_builder(&mut self) -> &mut QueryConditionBuilder;

    /// AND a condition onto the query. `params` bind the placeholder names
    /// used inside `condition` to their values.
    fn and_where(&mut self, condition: &str, params: Vec<(String, AttrValue)>);

    /// OR a condition onto the query.
    fn or_where(&mut self, condition: &str, params: Vec<(String, AttrValue)>);

    fn order_by(&mut self, field: &str, descending: bool);

    fn limit(&mut self, limit: u64);

    fn offset(&mut self, offset: u64);

    /// Toggle projection mode: rows come back as plain arrays instead of
    /// records.
    fn as_array(&mut self, as_array: bool);

    /// Number of rows matching the query.
    fn count(&mut self) -> Result<u64, QueryError>;

    /// Execute and return every matching row.
    fn all(&mut self) -> Result<Vec<QueryResult>, QueryError>;

    /// Execute and return the first matching row.
    fn one(&mut self) -> Result<Option<QueryResult>, QueryError>;

    /// Streamed iteration: a cursor yielding one row per step.
    fn each(&mut self, batch_size: usize) -> Box<dyn QueryCursor>;

    /// Batched iteration: a cursor yielding `batch_size` rows per step.
    fn batch(&mut self, batch_size: usize) -> Box<dyn QueryCursor>;

    /// Fetch the single row with the given primary key.
    ///
    /// Composes the condition through the query's condition builder, so the
    /// generated `pk` parameter never collides with caller conditions even
    /// when this runs more than once on one query.
    fn one_with_pk(&mut self, pk: &AttrValue) -> Result<Option<QueryResult>, QueryError> {
        let pk_name = self.primary_key_name();
        let (field, param) = {
            let builder = self.condition_builder();
            (
                builder.build_aliased_name_of_field(&pk_name, None),
                builder.build_aliased_name_of_param("pk", None),
            )
        };
        self.and_where(&format!("{field} = {param}"), vec![(param, pk.clone())]);
        self.one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubQuery;
    use serde_json::json;

    #[test]
    fn test_one_with_pk_builds_aliased_condition() {
        let mut query = StubQuery::new("widgets", vec![]);
        query.one_with_pk(&json!(7)).unwrap();

        assert_eq!(
            query.conditions(),
            vec!["[[widgets]].[[id]] = :widgets_pk".to_string()]
        );
    }

    #[test]
    fn test_repeated_pk_lookups_get_distinct_params() {
        let mut query = StubQuery::new("widgets", vec![]);
        query.one_with_pk(&json!(1)).unwrap();
        query.one_with_pk(&json!(2)).unwrap();

        assert_eq!(
            query.conditions(),
            vec![
                "[[widgets]].[[id]] = :widgets_pk".to_string(),
                "[[widgets]].[[id]] = :widgets_pk_1".to_string(),
            ]
        );
    }
}
