//! Paged entities provider
//!
//! A thin list-provider over one query: it pages the query with
//! limit/offset, converts the page into entities through the repository,
//! and answers totals for pagination widgets.

use crate::finder::{convert_query_result, FoundValue};
use crate::query::{QueryError, QueryRef};
use crate::repository::{EntitiesRepository, RepositoryError};
use std::rc::Rc;

const DEFAULT_PAGE_SIZE: usize = 20;

/// Paged provider of one entity family.
///
/// Pages are zero-based. The provider mutates its query on every
/// [`EntitiesProvider::models`] call, so one provider serves one listing.
pub struct EntitiesProvider {
    query: QueryRef,
    repository: Rc<EntitiesRepository>,
    page: usize,
    page_size: usize,
}

impl EntitiesProvider {
    pub fn new(query: QueryRef, repository: Rc<EntitiesRepository>) -> Self {
        Self {
            query,
            repository,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_page(&mut self, page: usize) -> &mut Self {
        self.page = page;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) -> &mut Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Total number of rows matched by the query, across all pages.
    pub fn total_count(&mut self) -> Result<u64, QueryError> {
        self.query.borrow_mut().count()
    }

    /// Number of pages at the current page size.
    pub fn page_count(&mut self) -> Result<usize, QueryError> {
        let total = self.total_count()? as usize;
        Ok(total.div_ceil(self.page_size))
    }

    /// Fetch and convert the current page.
    pub fn models(&mut self) -> Result<Vec<FoundValue>, RepositoryError> {
        let results = {
            let mut query = self.query.borrow_mut();
            query.limit(self.page_size as u64);
            query.offset((self.page * self.page_size) as u64);
            query.all()?
        };
        results
            .into_iter()
            .map(|result| convert_query_result(&self.repository, result))
            .collect()
    }
}
