//! Database facade.

use crate::batch::WriteBatch;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::cursor::{Cursor, ResultCursor, ScanCursor};
use crate::error::{CoreError, CoreResult};
use crate::keyspace::Namespace;
use crate::lsm::{LsmStore, StoreInfo};
use crate::sql;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::tracker::{ResourceKind, ResourceTracker};
use colderstorage_codec::{Row, Schema};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// An open ColderStorage database.
///
/// `Database` offers two access modes over one LSM tree:
/// - Raw keys: [`put`](Self::put), [`get`](Self::get),
///   [`delete`](Self::delete) and inclusive range [`scan`](Self::scan)
/// - Tables: [`execute`](Self::execute) a statement, then
///   [`fetch`](Self::fetch) its rows
///
/// Raw keys and table data live in separate namespaces, so a raw scan never
/// sees table rows.
///
/// # Example
///
/// ```rust,ignore
/// use colderstorage_core::Database;
/// use std::path::Path;
///
/// let mut db = Database::open(Path::new("my_database"))?;
/// db.put(b"apple", b"1")?;
/// assert_eq!(db.get(b"apple")?, Some(b"1".to_vec()));
///
/// db.execute("CREATE TABLE fruit (name TEXT, price REAL)")?;
/// db.execute("INSERT INTO fruit VALUES ('apple', 0.5)")?;
/// let rows = db.execute("SELECT * FROM fruit")?.commit()?;
///
/// db.close()?;
/// ```
///
/// # Statement results
///
/// At most one [`ResultCursor`] is active. Executing a statement closes the
/// previous cursor, and a failed statement leaves no cursor active.
pub struct Database {
    store: LsmStore,
    catalog: Catalog,
    tracker: Arc<ResourceTracker>,
    stats: Arc<DatabaseStats>,
    active: Option<ResultCursor>,
    leaked_at_close: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.store.path())
            .field("tables", &self.catalog.len())
            .field("open", &!self.store.is_closed())
            .finish_non_exhaustive()
    }
}

/// Shape of a database at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// LSM tree layout.
    pub store: StoreInfo,
    /// Number of tables in the catalog.
    pub tables: usize,
}

impl Database {
    /// Opens or creates the database at `path` with the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another instance has the database open (`DatabaseLocked`)
    /// - The format version is incompatible (`InvalidFormat`)
    /// - Stored data is corrupted or I/O fails
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`Database::open`], plus `InvalidArgument` for an unusable
    /// configuration.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let stats = Arc::new(DatabaseStats::new());
        let store = LsmStore::open(path, config, Arc::clone(&stats))?;
        let catalog = Catalog::load(&store)?;
        debug!(tables = catalog.len(), "catalog loaded");

        Ok(Self {
            store,
            catalog,
            tracker: ResourceTracker::new(),
            stats,
            active: None,
            leaked_at_close: false,
        })
    }

    /// Directory of the database.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Whether the database is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.store.is_closed()
    }

    /// Inserts or replaces a raw key.
    ///
    /// The write is durable when this returns if the WAL is enabled.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an oversized key or value, with
    /// `DatabaseClosed`, or on I/O errors. Nothing is written on failure.
    pub fn put(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(Namespace::Raw.key(key), value.to_vec());
        let result = self.store.write(&batch);
        if result.is_ok() {
            self.stats.record_write((key.len() + value.len()) as u64);
        }
        self.track(result)
    }

    /// Looks up a raw key.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or when stored data cannot be read.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let result = self.store.get(&Namespace::Raw.key(key));
        if let Ok(value) = &result {
            self.stats
                .record_read(value.as_ref().map_or(0, |v| v.len() as u64));
        }
        self.track(result)
    }

    /// Deletes a raw key. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an oversized key, with
    /// `DatabaseClosed`, or on I/O errors.
    pub fn delete(&self, key: &[u8]) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(Namespace::Raw.key(key));
        let result = self.store.write(&batch);
        if result.is_ok() {
            self.stats.record_delete();
        }
        self.track(result)
    }

    /// Opens a cursor over the raw keys in `[lower, upper]`.
    ///
    /// The cursor sees the data as of this call. It must be closed, or
    /// dropped, before the database closes; otherwise it is reported as a
    /// leak.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or when stored data cannot be read.
    pub fn scan(&self, lower: &[u8], upper: &[u8]) -> CoreResult<ScanCursor> {
        let result = self
            .store
            .scan(&Namespace::Raw.key(lower), &Namespace::Raw.key(upper))
            .map(|inner| {
                ScanCursor::new(
                    inner,
                    Namespace::Raw,
                    self.tracker.acquire(ResourceKind::ScanCursor),
                )
            });
        if result.is_ok() {
            self.stats.record_scan();
        }
        self.track(result)
    }

    /// Runs one statement and makes its result the active cursor.
    ///
    /// The previously active cursor is closed first.
    ///
    /// # Errors
    ///
    /// Returns `Sql` errors for rejected statements and storage errors for
    /// failed reads or writes. No cursor is active afterwards.
    pub fn execute(&mut self, sql: &str) -> CoreResult<&mut ResultCursor> {
        self.close_cursor();
        self.stats.record_statement();
        if self.store.is_closed() {
            return self.track(Err(CoreError::DatabaseClosed));
        }

        match sql::execute(&self.store, &mut self.catalog, &self.tracker, sql) {
            Ok(cursor) => {
                debug!(sql, "statement executed");
                Ok(self.active.insert(cursor))
            }
            Err(e) => {
                debug!(sql, error = %e, "statement failed");
                self.track(Err(e))
            }
        }
    }

    /// Fetches the next row of the active cursor.
    ///
    /// Returns `None` when there is no active cursor or its rows are
    /// exhausted; the cursor is closed and forgotten then.
    ///
    /// # Errors
    ///
    /// Fails if the row cannot be produced; the cursor is closed.
    pub fn fetch(&mut self) -> CoreResult<Option<Row>> {
        let Some(cursor) = self.active.as_mut() else {
            return Ok(None);
        };
        let result = cursor.fetch();
        if !cursor.is_open() {
            self.active = None;
        }
        self.track(result)
    }

    /// The active result cursor, if any.
    pub fn active_cursor(&mut self) -> Option<&mut ResultCursor> {
        self.active.as_mut()
    }

    /// Schema of the active result cursor, if any.
    #[must_use]
    pub fn cursor_schema(&self) -> Option<&Schema> {
        self.active.as_ref().map(ResultCursor::schema)
    }

    /// Closes the active result cursor, if any.
    pub fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.active.take() {
            cursor.close();
        }
    }

    /// Names of all tables, sorted case-insensitively.
    #[must_use]
    pub fn list_tables(&self) -> Vec<String> {
        self.catalog.names()
    }

    /// Schema of `name`, or `None` if there is no such table.
    #[must_use]
    pub fn display_table(&self, name: &str) -> Option<Schema> {
        self.catalog.get(name).map(|t| t.schema.clone())
    }

    /// Writes every memtable to SSTables.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or on I/O errors.
    pub fn flush(&self) -> CoreResult<()> {
        let result = self.store.flush();
        self.track(result)
    }

    /// Flushes and merges every SSTable, dropping deleted data.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or on I/O errors.
    pub fn compact(&self) -> CoreResult<()> {
        let result = self.store.compact();
        self.track(result)
    }

    /// Describes the current layout.
    #[must_use]
    pub fn info(&self) -> DatabaseInfo {
        DatabaseInfo {
            store: self.store.info(),
            tables: self.catalog.len(),
        }
    }

    /// Copies the operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The resource tracker of this database.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ResourceTracker> {
        &self.tracker
    }

    /// Whether any cursor or buffer is still acquired, or was at close.
    #[must_use]
    pub fn detect_leaks(&self) -> bool {
        self.leaked_at_close || self.tracker.detect_leaks()
    }

    /// Closes the active cursor and the database.
    ///
    /// Resources still acquired are logged as leaks and keep
    /// [`detect_leaks`](Self::detect_leaks) true. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if buffered writes cannot be made durable. The database is
    /// closed regardless.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.store.is_closed() {
            return Ok(());
        }
        self.close_cursor();

        for count in self.tracker.snapshot() {
            if count.outstanding() > 0 {
                warn!(
                    kind = %count.kind,
                    outstanding = count.outstanding(),
                    "resource still open at close"
                );
                self.leaked_at_close = true;
            }
        }
        self.store.close()
    }

    fn track<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close database");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::CursorState;
    use colderstorage_codec::{Type, Value};
    use tempfile::tempdir;

    #[test]
    fn raw_and_tables_do_not_mix() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path()).unwrap();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        db.put(b"k", b"v").unwrap();

        let mut cursor = db.scan(b"", &[0xff; 8]).unwrap();
        assert_eq!(cursor.key(), Some(&b"k"[..]));
        cursor.next().unwrap();
        assert!(!cursor.is_valid());
        cursor.close();
        assert_eq!(db.list_tables(), vec!["t".to_string()]);
    }

    #[test]
    fn fetch_walks_active_cursor() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path()).unwrap();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        db.execute("INSERT INTO t VALUES (1), (2)").unwrap();

        db.execute("SELECT n FROM t").unwrap();
        assert_eq!(
            db.cursor_schema(),
            Some(&Schema::from_pairs([("n", Type::Integer)]))
        );
        assert_eq!(db.fetch().unwrap(), Some(vec![Value::Integer(1)]));
        assert_eq!(db.fetch().unwrap(), Some(vec![Value::Integer(2)]));
        assert_eq!(db.fetch().unwrap(), None);
        assert!(db.active_cursor().is_none());
        assert_eq!(db.fetch().unwrap(), None);
    }

    #[test]
    fn new_statement_closes_previous_cursor() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path()).unwrap();
        db.execute("CREATE TABLE t (n INTEGER)").unwrap();
        db.execute("SELECT * FROM t").unwrap();
        assert_eq!(db.tracker().outstanding(ResourceKind::ResultCursor), 1);

        assert!(db.execute("SELECT * FROM nowhere").is_err());
        assert!(db.active_cursor().is_none());
        assert!(!db.detect_leaks());
    }

    #[test]
    fn display_table() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path()).unwrap();
        db.execute("CREATE TABLE Users (id INTEGER, name TEXT)").unwrap();
        let state = db.active_cursor().map(|c| c.state());
        assert_eq!(state, Some(CursorState::Open));

        assert_eq!(
            db.display_table("users"),
            Some(Schema::from_pairs([("id", Type::Integer), ("name", Type::Text)]))
        );
        assert_eq!(db.display_table("absent"), None);
        // Neither call touched the active cursor.
        assert!(db.active_cursor().is_some());
    }

    #[test]
    fn stats_count_operations() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path()).unwrap();
        db.put(b"a", b"12").unwrap();
        db.get(b"a").unwrap();
        db.delete(b"a").unwrap();
        db.scan(b"a", b"z").unwrap().close();
        let _ = db.execute("SELECT * FROM missing");

        let stats = db.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.bytes_written, 3);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.bytes_read, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.scans, 1);
        assert_eq!(stats.statements, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn operations_after_close_fail() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path()).unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        assert!(matches!(db.put(b"k", b"v"), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.execute("SELECT * FROM t"), Err(CoreError::DatabaseClosed)));
        db.close().unwrap();
    }
}
