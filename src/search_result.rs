//! Search result adapter
//!
//! Wraps an engine-side [`QueryCursor`] and converts each position's rows
//! into entities on access, so streaming a large result set never
//! materializes more than the cursor's current page. The adapter keeps the
//! cursor's own protocol (`rewind`/`valid`/`current`/`advance`/`key`) and
//! additionally implements [`Iterator`] for idiomatic `for` loops.

use crate::finder::{convert_query_result, FoundValue};
use crate::query::{CursorItem, IterationMode, QueryCursor};
use crate::repository::{EntitiesRepository, RepositoryError};
use std::rc::Rc;

/// The converted value at a cursor position.
pub enum SearchItem {
    /// One result of a [`IterationMode::Streamed`] cursor.
    One(FoundValue),
    /// One page of a [`IterationMode::Batched`] cursor.
    Page(Vec<FoundValue>),
}

/// Lazily-converting view over a query cursor.
pub struct SearchResult {
    cursor: Box<dyn QueryCursor>,
    repository: Rc<EntitiesRepository>,
}

impl SearchResult {
    pub fn new(cursor: Box<dyn QueryCursor>, repository: Rc<EntitiesRepository>) -> Self {
        Self { cursor, repository }
    }

    pub fn mode(&self) -> IterationMode {
        self.cursor.mode()
    }

    /// Reset to the first position.
    pub fn rewind(&mut self) {
        self.cursor.rewind();
    }

    /// Whether the current position holds data.
    pub fn valid(&self) -> bool {
        self.cursor.valid()
    }

    /// Convert and return the item at the current position.
    ///
    /// Conversion happens on every call; callers iterating manually should
    /// read each position once.
    pub fn current(&self) -> Option<Result<SearchItem, RepositoryError>> {
        let item = self.cursor.current()?;
        Some(self.convert_item(item))
    }

    /// Advance the underlying cursor one position.
    pub fn advance(&mut self) {
        self.cursor.next();
    }

    /// Zero-based index of the current position.
    pub fn key(&self) -> usize {
        self.cursor.key()
    }

    fn convert_item(&self, item: CursorItem) -> Result<SearchItem, RepositoryError> {
        match item {
            CursorItem::One(result) => {
                Ok(SearchItem::One(convert_query_result(&self.repository, result)?))
            }
            CursorItem::Page(results) => {
                let converted = results
                    .into_iter()
                    .map(|result| convert_query_result(&self.repository, result))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SearchItem::Page(converted))
            }
        }
    }
}

impl Iterator for SearchResult {
    type Item = Result<SearchItem, RepositoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.cursor.valid() {
            return None;
        }
        let item = self.current();
        self.cursor.next();
        item
    }
}
