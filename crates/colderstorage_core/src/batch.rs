//! Write batches: the unit of atomic mutation.

use crate::error::{CoreError, CoreResult};

/// Longest accepted engine key in bytes, namespace byte included.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Longest accepted value, in bytes.
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOp {
    /// Full engine key, namespace prefix included.
    pub key: Vec<u8>,
    /// New value, or `None` for a tombstone.
    pub value: Option<Vec<u8>>,
}

/// An ordered list of puts and deletes applied all-or-nothing.
///
/// A batch becomes one WAL record, so after a crash either every operation
/// in it is recovered or none is. Later operations on the same key win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an upsert.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp {
            key: key.into(),
            value: Some(value.into()),
        });
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp {
            key: key.into(),
            value: None,
        });
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The queued operations, in order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }

    /// Approximate memory footprint of the keys and values.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.ops
            .iter()
            .map(|op| op.key.len() + op.value.as_ref().map_or(0, Vec::len))
            .sum()
    }

    /// Checks every key and value against the engine limits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty or oversized key or an
    /// oversized value.
    pub fn validate(&self) -> CoreResult<()> {
        for op in &self.ops {
            if op.key.is_empty() {
                return Err(CoreError::invalid_argument("key must not be empty"));
            }
            if op.key.len() > MAX_KEY_LEN {
                return Err(CoreError::invalid_argument(format!(
                    "key of {} bytes exceeds the {MAX_KEY_LEN} byte limit",
                    op.key.len()
                )));
            }
            if let Some(value) = &op.value {
                if value.len() > MAX_VALUE_LEN {
                    return Err(CoreError::invalid_argument(format!(
                        "value of {} bytes exceeds the {MAX_VALUE_LEN} byte limit",
                        value.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = &'a BatchOp;
    type IntoIter = std::slice::Iter<'a, BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
