//! Raw range scan cursor.

use super::{Cursor, CursorState};
use crate::error::CoreResult;
use crate::iterator::{BoundedIterator, KvIterator};
use crate::keyspace::Namespace;
use crate::tracker::ResourceGuard;

/// Walks the live entries of an inclusive key range in ascending order.
///
/// Sees the data as of its creation. Keys are reported without their
/// namespace byte.
pub struct ScanCursor {
    inner: BoundedIterator,
    namespace: Namespace,
    state: CursorState,
    guard: ResourceGuard,
}

impl std::fmt::Debug for ScanCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCursor")
            .field("namespace", &self.namespace)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ScanCursor {
    pub(crate) fn new(inner: BoundedIterator, namespace: Namespace, guard: ResourceGuard) -> Self {
        let state = if inner.is_valid() {
            CursorState::Open
        } else {
            CursorState::Exhausted
        };
        Self {
            inner,
            namespace,
            state,
            guard,
        }
    }

    /// Whether the cursor is positioned on an entry.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state == CursorState::Open && self.inner.is_valid()
    }

    /// Key of the current entry, or `None` when not positioned.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        if !self.is_valid() {
            return None;
        }
        let key = self.inner.key();
        Some(self.namespace.strip(key).unwrap_or(key))
    }

    /// Value of the current entry, or `None` when not positioned.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        if !self.is_valid() {
            return None;
        }
        self.inner.value()
    }

    /// Advances to the next entry. A no-op once exhausted or closed.
    ///
    /// # Errors
    ///
    /// Fails if an SSTable block cannot be read.
    pub fn next(&mut self) -> CoreResult<()> {
        if self.state != CursorState::Open {
            return Ok(());
        }
        self.inner.next()?;
        if !self.inner.is_valid() {
            self.state = CursorState::Exhausted;
        }
        Ok(())
    }
}

impl Cursor for ScanCursor {
    fn state(&self) -> CursorState {
        self.state
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
        self.guard.release();
    }
}

impl Iterator for ScanCursor {
    type Item = CoreResult<(Vec<u8>, Vec<u8>)>;

    /// Yields the current entry and advances.
    fn next(&mut self) -> Option<Self::Item> {
        let item = (self.key()?.to_vec(), self.value()?.to_vec());
        Some(ScanCursor::next(self).map(|()| item))
    }
}
