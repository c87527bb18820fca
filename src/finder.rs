//! Finder
//!
//! The finder pairs one query with its owning repository: it forwards the
//! fluent query-building calls to the query and converts everything the
//! query returns into entities through the repository. The query never
//! learns about entities and the repository never learns about SQL; the
//! finder is the only place the two meet.

use crate::query::{QueryError, QueryRef, QueryResult};
use crate::repository::{EntitiesRepository, RepositoryError};
use crate::search_result::SearchResult;
use crate::value::AttrValue;
use std::rc::Rc;

/// One converted search result.
///
/// Record rows come back as entities; projection rows (a query switched to
/// array mode) pass through as raw values.
#[derive(Clone)]
pub enum FoundValue {
    Entity(crate::entity::EntityRef),
    Raw(AttrValue),
}

impl FoundValue {
    pub fn as_entity(&self) -> Option<&crate::entity::EntityRef> {
        match self {
            FoundValue::Entity(entity) => Some(entity),
            FoundValue::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&AttrValue> {
        match self {
            FoundValue::Raw(value) => Some(value),
            FoundValue::Entity(_) => None,
        }
    }
}

/// Convert one query row through the repository.
pub(crate) fn convert_query_result(
    repository: &EntitiesRepository,
    result: QueryResult,
) -> Result<FoundValue, RepositoryError> {
    match result {
        QueryResult::Record(record) => {
            let entity = repository.create_entity_from_source(record)?;
            Ok(FoundValue::Entity(entity))
        }
        QueryResult::Row(row) => Ok(FoundValue::Raw(row)),
    }
}

/// Fluent search interface of one entity family.
///
/// Built by [`EntitiesRepository::find`]; custom finder types are registered
/// in the context under the family's `...Finder` name and add their own
/// named scopes on top of the passthroughs.
pub struct Finder {
    query: QueryRef,
    repository: Rc<EntitiesRepository>,
}

impl Finder {
    pub fn new(query: QueryRef, repository: Rc<EntitiesRepository>) -> Self {
        Self { query, repository }
    }

    pub fn query(&self) -> &QueryRef {
        &self.query
    }

    pub fn repository(&self) -> &Rc<EntitiesRepository> {
        &self.repository
    }

    //region ------------------- fluent delegation -------------------

    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.query.borrow_mut().set_alias(alias);
        self
    }

    pub fn and_where(&mut self, condition: &str, params: Vec<(String, AttrValue)>) -> &mut Self {
        self.query.borrow_mut().and_where(condition, params);
        self
    }

    pub fn or_where(&mut self, condition: &str, params: Vec<(String, AttrValue)>) -> &mut Self {
        self.query.borrow_mut().or_where(condition, params);
        self
    }

    pub fn order_by(&mut self, field: &str, descending: bool) -> &mut Self {
        self.query.borrow_mut().order_by(field, descending);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.query.borrow_mut().limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.query.borrow_mut().offset(offset);
        self
    }

    /// Switch the query to projection mode; results come back as
    /// [`FoundValue::Raw`] rows.
    pub fn as_array(&mut self, as_array: bool) -> &mut Self {
        self.query.borrow_mut().as_array(as_array);
        self
    }

    //endregion

    //region ------------------- execution -------------------

    pub fn count(&mut self) -> Result<u64, QueryError> {
        self.query.borrow_mut().count()
    }

    /// Execute and convert every matching row.
    pub fn all(&mut self) -> Result<Vec<FoundValue>, RepositoryError> {
        let results = self.query.borrow_mut().all()?;
        results
            .into_iter()
            .map(|result| convert_query_result(&self.repository, result))
            .collect()
    }

    /// Execute and convert the first matching row.
    pub fn one(&mut self) -> Result<Option<FoundValue>, RepositoryError> {
        let result = self.query.borrow_mut().one()?;
        result
            .map(|result| convert_query_result(&self.repository, result))
            .transpose()
    }

    /// Fetch and convert the single row with the given primary key.
    pub fn one_with_pk(&mut self, pk: &AttrValue) -> Result<Option<FoundValue>, RepositoryError> {
        let result = self.query.borrow_mut().one_with_pk(pk)?;
        result
            .map(|result| convert_query_result(&self.repository, result))
            .transpose()
    }

    /// Streamed iteration: one converted result per step.
    pub fn each(&mut self, batch_size: usize) -> SearchResult {
        let cursor = self.query.borrow_mut().each(batch_size);
        SearchResult::new(cursor, self.repository.clone())
    }

    /// Batched iteration: one converted page per step.
    pub fn batch(&mut self, batch_size: usize) -> SearchResult {
        let cursor = self.query.borrow_mut().batch(batch_size);
        SearchResult::new(cursor, self.repository.clone())
    }

    //endregion
}
