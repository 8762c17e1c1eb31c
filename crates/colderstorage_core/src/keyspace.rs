//! Key namespaces sharing one LSM tree.
//!
//! Every engine key starts with one namespace byte, so raw keys, catalog
//! entries and table rows never collide and a scan inside one namespace
//! never sees another.

/// The namespaces of the engine key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Namespace {
    /// Engine bookkeeping, such as the table id allocator.
    Meta = 0x00,
    /// Keys written through the raw key-value API.
    Raw = 0x01,
    /// One entry per table, keyed by lowercase table name.
    Catalog = 0x02,
    /// Table rows, keyed by table id and row id.
    Rows = 0x03,
}

impl Namespace {
    /// Prefixes `key` with this namespace.
    #[must_use]
    pub fn key(self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + key.len());
        out.push(self as u8);
        out.extend_from_slice(key);
        out
    }

    /// Strips this namespace from an engine key.
    #[must_use]
    pub fn strip(self, key: &[u8]) -> Option<&[u8]> {
        match key.split_first() {
            Some((&ns, rest)) if ns == self as u8 => Some(rest),
            _ => None,
        }
    }

    /// Inclusive bounds covering the whole namespace.
    #[must_use]
    pub fn bounds(self) -> (Vec<u8>, Vec<u8>) {
        (vec![self as u8], max_key_with_prefix(&[self as u8]))
    }
}

/// Engine key of the table id allocator.
pub const NEXT_TABLE_ID_KEY: &[u8] = b"\x00next_table_id";

/// Engine key of row `row_id` in table `table_id`.
///
/// Big-endian ids keep rows of one table contiguous and in insertion order.
#[must_use]
pub fn row_key(table_id: u32, row_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(13);
    key.push(Namespace::Rows as u8);
    key.extend_from_slice(&table_id.to_be_bytes());
    key.extend_from_slice(&row_id.to_be_bytes());
    key
}

/// Inclusive bounds covering every row of `table_id`.
#[must_use]
pub fn row_bounds(table_id: u32) -> (Vec<u8>, Vec<u8>) {
    (row_key(table_id, 0), row_key(table_id, u64::MAX))
}

/// Engine key of the catalog entry for `name`.
#[must_use]
pub fn catalog_key(name: &str) -> Vec<u8> {
    Namespace::Catalog.key(name.to_lowercase().as_bytes())
}

/// Largest key a namespace can hold, used as an inclusive upper bound.
fn max_key_with_prefix(prefix: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.resize(crate::batch::MAX_KEY_LEN, 0xff);
    key
}
