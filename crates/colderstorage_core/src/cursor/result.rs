//! Statement result cursor.

use super::{Cursor, CursorState};
use crate::error::CoreResult;
use crate::tracker::ResourceGuard;
use colderstorage_codec::{Row, Schema};
use std::collections::VecDeque;

/// A producer of result rows.
pub trait RowSource: Send {
    /// The next row, or `None` when there are no more.
    ///
    /// # Errors
    ///
    /// Fails if stored data cannot be read or decoded.
    fn next_row(&mut self) -> CoreResult<Option<Row>>;
}

impl RowSource for VecDeque<Row> {
    fn next_row(&mut self) -> CoreResult<Option<Row>> {
        Ok(self.pop_front())
    }
}

/// Rows produced by one statement.
///
/// Closes itself when the rows run out or producing a row fails.
pub struct ResultCursor {
    schema: Schema,
    source: Option<Box<dyn RowSource>>,
    state: CursorState,
    guard: ResourceGuard,
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("schema", &self.schema)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ResultCursor {
    pub(crate) fn new(schema: Schema, source: Box<dyn RowSource>, guard: ResourceGuard) -> Self {
        Self {
            schema,
            source: Some(source),
            state: CursorState::Open,
            guard,
        }
    }

    pub(crate) fn materialized(schema: Schema, rows: Vec<Row>, guard: ResourceGuard) -> Self {
        Self::new(schema, Box::new(VecDeque::from(rows)), guard)
    }

    /// Describes every row this cursor yields.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the next row.
    ///
    /// `None` means the rows are exhausted; the cursor is closed by then and
    /// later calls keep returning `None`.
    ///
    /// # Errors
    ///
    /// Fails if a row cannot be produced; the cursor is closed.
    pub fn fetch(&mut self) -> CoreResult<Option<Row>> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        match source.next_row() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Drains every remaining row and closes the cursor.
    ///
    /// # Errors
    ///
    /// Fails if a row cannot be produced; the cursor is closed and the rows
    /// read so far are dropped.
    pub fn commit(&mut self) -> CoreResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl Cursor for ResultCursor {
    fn state(&self) -> CursorState {
        self.state
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
        self.source = None;
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::tracker::{ResourceKind, ResourceTracker};
    use colderstorage_codec::{Type, Value};
    use std::sync::Arc;

    fn cursor(rows: Vec<Row>, tracker: &Arc<ResourceTracker>) -> ResultCursor {
        ResultCursor::materialized(
            Schema::from_pairs([("n", Type::Integer)]),
            rows,
            tracker.acquire(ResourceKind::ResultCursor),
        )
    }

    #[test]
    fn fetch_until_exhausted_then_closed() {
        let tracker = ResourceTracker::new();
        let mut c = cursor(vec![vec![Value::Integer(1)], vec![Value::Integer(2)]], &tracker);
        assert_eq!(c.schema().len(), 1);
        assert_eq!(c.fetch().unwrap(), Some(vec![Value::Integer(1)]));
        assert!(c.is_open());
        assert_eq!(c.fetch().unwrap(), Some(vec![Value::Integer(2)]));
        assert_eq!(c.fetch().unwrap(), None);
        assert_eq!(c.state(), CursorState::Closed);
        assert_eq!(c.fetch().unwrap(), None);
        assert!(!tracker.detect_leaks());
    }

    #[test]
    fn commit_drains() {
        let tracker = ResourceTracker::new();
        let mut c = cursor(vec![vec![Value::Integer(7)]; 3], &tracker);
        assert_eq!(c.commit().unwrap().len(), 3);
        assert_eq!(c.state(), CursorState::Closed);
        assert!(c.commit().unwrap().is_empty());
    }

    struct Failing;

    impl RowSource for Failing {
        fn next_row(&mut self) -> CoreResult<Option<Row>> {
            Err(CoreError::invalid_format("broken row"))
        }
    }

    #[test]
    fn failure_closes() {
        let tracker = ResourceTracker::new();
        let mut c = ResultCursor::new(
            Schema::empty(),
            Box::new(Failing),
            tracker.acquire(ResourceKind::ResultCursor),
        );
        assert!(c.commit().is_err());
        assert_eq!(c.state(), CursorState::Closed);
        assert_eq!(c.fetch().unwrap(), None);
        assert!(!tracker.detect_leaks());
    }

    #[test]
    fn explicit_close_releases() {
        let tracker = ResourceTracker::new();
        let mut c = cursor(vec![vec![Value::Null]], &tracker);
        c.close();
        assert_eq!(c.fetch().unwrap(), None);
        assert!(!tracker.detect_leaks());
    }
}
