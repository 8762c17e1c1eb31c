//! Sorted key-value iterators and the k-way merge over them.

use crate::error::CoreResult;

/// A cursor over sorted `(key, value-or-tombstone)` entries.
///
/// Positioned on its first entry when created. `key` and `value` may only be
/// called while `is_valid` is true.
pub trait KvIterator: Send {
    /// Whether the iterator is positioned on an entry.
    fn is_valid(&self) -> bool;

    /// Key of the current entry.
    fn key(&self) -> &[u8];

    /// Value of the current entry, or `None` for a tombstone.
    fn value(&self) -> Option<&[u8]>;

    /// Moves to the next entry.
    ///
    /// # Errors
    ///
    /// Fails if the underlying storage cannot be read.
    fn next(&mut self) -> CoreResult<()>;
}

/// Iterator over an owned, already sorted list of entries.
#[derive(Debug)]
pub struct SnapshotIterator {
    entries: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    pos: usize,
}

impl SnapshotIterator {
    /// Wraps entries that are sorted by key without duplicates.
    #[must_use]
    pub fn new(entries: Vec<(Vec<u8>, Option<Vec<u8>>)>) -> Self {
        Self { entries, pos: 0 }
    }
}

impl KvIterator for SnapshotIterator {
    fn is_valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> Option<&[u8]> {
        self.entries[self.pos].1.as_deref()
    }

    fn next(&mut self) -> CoreResult<()> {
        if self.is_valid() {
            self.pos += 1;
        }
        Ok(())
    }
}

/// Merges several sorted sources into one sorted stream.
///
/// Sources are ordered newest first. When several sources hold the same
/// key, the entry from the lowest-index source is returned and the others
/// are skipped.
pub struct MergeIterator {
    sources: Vec<Box<dyn KvIterator>>,
    current: Option<usize>,
}

impl MergeIterator {
    /// Builds a merge over `sources`, newest first.
    #[must_use]
    pub fn new(sources: Vec<Box<dyn KvIterator>>) -> Self {
        let mut merged = Self {
            sources,
            current: None,
        };
        merged.select();
        merged
    }

    /// Points `current` at the source with the smallest key; ties go to the
    /// newest source.
    fn select(&mut self) {
        let mut best: Option<usize> = None;
        for (i, source) in self.sources.iter().enumerate() {
            if !source.is_valid() {
                continue;
            }
            match best {
                Some(b) if self.sources[b].key() <= source.key() => {}
                _ => best = Some(i),
            }
        }
        self.current = best;
    }
}

impl KvIterator for MergeIterator {
    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        match self.current {
            Some(i) => self.sources[i].key(),
            None => &[],
        }
    }

    fn value(&self) -> Option<&[u8]> {
        self.current.and_then(|i| self.sources[i].value())
    }

    fn next(&mut self) -> CoreResult<()> {
        let Some(current) = self.current else {
            return Ok(());
        };
        let key = self.sources[current].key().to_vec();
        for source in &mut self.sources {
            while source.is_valid() && source.key() == key.as_slice() {
                source.next()?;
            }
        }
        self.select();
        Ok(())
    }
}

/// Live entries of a merge, up to an inclusive upper bound.
///
/// Tombstones are skipped and iteration stops at the first key past
/// `upper`.
pub struct BoundedIterator {
    inner: MergeIterator,
    upper: Vec<u8>,
}

impl BoundedIterator {
    /// Wraps `inner` and positions on the first live entry.
    ///
    /// # Errors
    ///
    /// Fails if skipping leading tombstones hits a read error.
    pub fn new(inner: MergeIterator, upper: Vec<u8>) -> CoreResult<Self> {
        let mut it = Self { inner, upper };
        it.skip_tombstones()?;
        Ok(it)
    }

    fn skip_tombstones(&mut self) -> CoreResult<()> {
        while self.inner.is_valid() && self.inner.value().is_none() && self.in_bounds() {
            self.inner.next()?;
        }
        Ok(())
    }

    fn in_bounds(&self) -> bool {
        self.inner.key() <= self.upper.as_slice()
    }
}

impl KvIterator for BoundedIterator {
    fn is_valid(&self) -> bool {
        self.inner.is_valid() && self.in_bounds()
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> Option<&[u8]> {
        self.inner.value()
    }

    fn next(&mut self) -> CoreResult<()> {
        if !self.is_valid() {
            return Ok(());
        }
        self.inner.next()?;
        self.skip_tombstones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn source(entries: &[(&str, Option<&str>)]) -> Box<dyn KvIterator> {
        Box::new(SnapshotIterator::new(
            entries
                .iter()
                .map(|(k, v)| (k.as_bytes().to_vec(), v.map(|v| v.as_bytes().to_vec())))
                .collect(),
        ))
    }

    fn drain(it: &mut dyn KvIterator) -> Vec<(String, Option<String>)> {
        let mut out = Vec::new();
        while it.is_valid() {
            out.push((
                String::from_utf8(it.key().to_vec()).unwrap(),
                it.value().map(|v| String::from_utf8(v.to_vec()).unwrap()),
            ));
            it.next().unwrap();
        }
        out
    }

    #[test]
    fn newest_source_wins() {
        let newer = source(&[("b", Some("new")), ("d", None)]);
        let older = source(&[("a", Some("1")), ("b", Some("old")), ("d", Some("4"))]);
        let mut merged = MergeIterator::new(vec![newer, older]);

        assert_eq!(
            drain(&mut merged),
            vec![
                ("a".into(), Some("1".into())),
                ("b".into(), Some("new".into())),
                ("d".into(), None),
            ]
        );
    }

    #[test]
    fn bounded_skips_tombstones_and_stops() {
        let newer = source(&[("a", None), ("c", None)]);
        let older = source(&[("a", Some("1")), ("b", Some("2")), ("c", Some("3")), ("e", Some("5"))]);
        let mut it =
            BoundedIterator::new(MergeIterator::new(vec![newer, older]), b"d".to_vec()).unwrap();

        assert_eq!(drain(&mut it), vec![("b".into(), Some("2".into()))]);
        it.next().unwrap();
        assert!(!it.is_valid());
    }

    #[test]
    fn empty_merge() {
        let mut merged = MergeIterator::new(Vec::new());
        assert!(!merged.is_valid());
        merged.next().unwrap();
        assert!(!merged.is_valid());
    }

    proptest! {
        #[test]
        fn merge_matches_layered_map(
            layers in prop::collection::vec(
                prop::collection::btree_map(0u8..32, prop::option::of(any::<u8>()), 0..16),
                1..5,
            )
        ) {
            // Oldest layer first in the model; newest overrides.
            let mut model = BTreeMap::new();
            for layer in layers.iter().rev() {
                for (k, v) in layer {
                    model.insert(vec![*k], v.map(|v| vec![v]));
                }
            }

            let sources: Vec<Box<dyn KvIterator>> = layers
                .iter()
                .map(|layer| {
                    Box::new(SnapshotIterator::new(
                        layer.iter().map(|(k, v)| (vec![*k], v.map(|v| vec![v]))).collect(),
                    )) as Box<dyn KvIterator>
                })
                .collect();
            let mut merged = MergeIterator::new(sources);

            let mut got = Vec::new();
            while merged.is_valid() {
                got.push((merged.key().to_vec(), merged.value().map(<[u8]>::to_vec)));
                merged.next().unwrap();
            }
            let expected: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(got, expected);
        }
    }
}
