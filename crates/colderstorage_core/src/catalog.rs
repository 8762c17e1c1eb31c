//! Table metadata.
//!
//! Each table has one entry in the catalog namespace, keyed by its lowercase
//! name. The entry is a codec row:
//!
//! ```text
//! (id integer, name text, next_row_id integer, schema blob)
//! ```
//!
//! where `schema` is a schema payload. The table id allocator lives under
//! [`NEXT_TABLE_ID_KEY`] as a little-endian `u32`; ids are never reused.

use crate::error::{CoreError, CoreResult};
use crate::iterator::KvIterator;
use crate::keyspace::{catalog_key, Namespace, NEXT_TABLE_ID_KEY};
use crate::lsm::LsmStore;
use colderstorage_codec::{decode_row, decode_schema, encode_row, encode_schema, Schema, Value};
use std::collections::BTreeMap;

/// Metadata of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Stable id used in row keys.
    pub id: u32,
    /// Name as given at creation.
    pub name: String,
    /// Id the next inserted row gets.
    pub next_row_id: u64,
    /// Column layout.
    pub schema: Schema,
}

impl TableMeta {
    /// Engine key of this entry.
    #[must_use]
    pub fn key(&self) -> Vec<u8> {
        catalog_key(&self.name)
    }

    /// Serializes the entry.
    ///
    /// # Errors
    ///
    /// Fails if the schema or name exceed codec limits.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let next_row_id = i64::try_from(self.next_row_id)
            .map_err(|_| CoreError::invalid_argument("row id space exhausted"))?;
        Ok(encode_row(&[
            Value::Integer(i64::from(self.id)),
            Value::Text(self.name.clone()),
            Value::Integer(next_row_id),
            Value::Blob(encode_schema(&self.schema)?),
        ])?)
    }

    /// Deserializes an entry.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidFormat` if the entry is malformed.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let malformed = || CoreError::invalid_format("malformed catalog entry");
        let row = decode_row(bytes)?;
        match row.as_slice() {
            [Value::Integer(id), Value::Text(name), Value::Integer(next), Value::Blob(schema)] => {
                Ok(Self {
                    id: u32::try_from(*id).map_err(|_| malformed())?,
                    name: name.clone(),
                    next_row_id: u64::try_from(*next).map_err(|_| malformed())?,
                    schema: decode_schema(schema)?,
                })
            }
            _ => Err(malformed()),
        }
    }
}

/// In-memory copy of every table entry.
///
/// Callers write catalog changes through the store first and only then
/// apply them here, so a failed write leaves the cache untouched.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableMeta>,
    next_table_id: u32,
}

impl Catalog {
    /// Reads every entry from the store.
    ///
    /// # Errors
    ///
    /// Fails on read errors or malformed entries.
    pub fn load(store: &LsmStore) -> CoreResult<Self> {
        let next_table_id = match store.get(NEXT_TABLE_ID_KEY)? {
            Some(raw) => {
                let bytes: [u8; 4] = raw
                    .as_slice()
                    .try_into()
                    .map_err(|_| CoreError::invalid_format("malformed table id allocator"))?;
                u32::from_le_bytes(bytes)
            }
            None => 0,
        };

        let mut tables = BTreeMap::new();
        let (lower, upper) = Namespace::Catalog.bounds();
        let mut it = store.scan(&lower, &upper)?;
        while it.is_valid() {
            let meta = TableMeta::decode(it.value().unwrap_or_default())?;
            tables.insert(meta.name.to_lowercase(), meta);
            it.next()?;
        }
        Ok(Self {
            tables,
            next_table_id,
        })
    }

    /// Looks up a table, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(&name.to_lowercase())
    }

    /// Whether a table with this name exists, ignoring case.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Table names, sorted case-insensitively.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name.clone()).collect()
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The id the next created table receives.
    ///
    /// # Errors
    ///
    /// Fails once every id has been used.
    pub fn peek_table_id(&self) -> CoreResult<u32> {
        if self.next_table_id == u32::MAX {
            return Err(CoreError::invalid_argument("table id space exhausted"));
        }
        Ok(self.next_table_id)
    }

    /// Records a committed table entry, consuming its id.
    pub(crate) fn insert(&mut self, meta: TableMeta) {
        self.next_table_id = self.next_table_id.max(meta.id.saturating_add(1));
        self.tables.insert(meta.name.to_lowercase(), meta);
    }

    /// Replaces a committed entry, such as after an insert moved its row id.
    pub(crate) fn update(&mut self, meta: TableMeta) {
        self.tables.insert(meta.name.to_lowercase(), meta);
    }

    /// Forgets a committed drop.
    pub(crate) fn remove(&mut self, name: &str) -> Option<TableMeta> {
        self.tables.remove(&name.to_lowercase())
    }
}

/// Value stored under [`NEXT_TABLE_ID_KEY`] once `id` is taken.
pub(crate) fn encode_next_table_id(id: u32) -> Vec<u8> {
    id.saturating_add(1).to_le_bytes().to_vec()
}
