//! In-memory sorted write buffer.

use crate::batch::WriteBatch;
use crate::iterator::SnapshotIterator;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A sorted map of recent writes.
///
/// Deletes are kept as tombstones (`None`) so they keep hiding older values
/// in frozen memtables and SSTables until compaction drops them.
#[derive(Debug)]
pub struct MemTable {
    id: u64,
    map: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    approximate_size: usize,
}

impl MemTable {
    /// Creates an empty memtable. Its WAL and its SSTable share `id`.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            map: BTreeMap::new(),
            approximate_size: 0,
        }
    }

    /// Id of this memtable.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Applies every operation of `batch`, in order.
    pub fn apply(&mut self, batch: &WriteBatch) {
        for op in batch {
            self.approximate_size += op.key.len() + op.value.as_ref().map_or(0, Vec::len);
            self.map.insert(op.key.clone(), op.value.clone());
        }
    }

    /// Looks up `key`.
    ///
    /// `None` means the key was never written here; `Some(None)` is a
    /// tombstone.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.map.get(key).map(Option::as_deref)
    }

    /// Copies the entries in `[lower, upper]` into a standalone iterator.
    #[must_use]
    pub fn snapshot(&self, lower: &[u8], upper: &[u8]) -> SnapshotIterator {
        if lower > upper {
            return SnapshotIterator::new(Vec::new());
        }
        let entries = self
            .map
            .range::<[u8], _>((Bound::Included(lower), Bound::Included(upper)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        SnapshotIterator::new(entries)
    }

    /// All entries in key order, tombstones included.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], Option<&[u8]>)> {
        self.map.iter().map(|(k, v)| (k.as_slice(), v.as_deref()))
    }

    /// Bytes written into this memtable, counting overwritten versions.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    /// Number of distinct keys, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
