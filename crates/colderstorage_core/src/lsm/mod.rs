//! The log-structured merge tree.
//!
//! Writes go to the WAL of the active memtable and then into the memtable.
//! A memtable that reaches `target_sst_size` is frozen; frozen memtables are
//! flushed oldest first into SSTables once more than `num_memtable_limit` of
//! them wait. Once `compaction_trigger` SSTables have been flushed since the
//! last compaction, every table is merged into a fresh, tombstone-free set.
//!
//! Recency is positional: the active memtable is newest, then the frozen
//! memtables, then the SSTables in manifest order. File ids only name files.

mod compaction;
mod recovery;

use crate::batch::WriteBatch;
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::iterator::{BoundedIterator, KvIterator, MergeIterator};
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::sstable::{SsTable, SsTableBuilder, SsTableIterator};
use crate::stats::DatabaseStats;
use crate::wal::Wal;
use colderstorage_storage::FileBackend;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shape of the tree at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    /// Directory of the database.
    pub path: PathBuf,
    /// Format version recorded in the manifest.
    pub format_version: (u16, u16),
    /// Id of the active memtable.
    pub memtable_id: u64,
    /// Bytes written into the active memtable.
    pub memtable_bytes: usize,
    /// Frozen memtables waiting for a flush.
    pub frozen_memtables: usize,
    /// Live SSTable ids, newest first.
    pub sstables: Vec<u64>,
    /// Total size of the live SSTables.
    pub sstable_bytes: u64,
    /// Whether writes are logged.
    pub wal_enabled: bool,
}

struct LsmState {
    dir: DatabaseDir,
    memtable: MemTable,
    wal: Option<Wal>,
    /// Frozen memtables, newest first.
    imm: Vec<Arc<MemTable>>,
    /// Live SSTables, newest first.
    ssts: Vec<Arc<SsTable>>,
    manifest: Manifest,
    /// SSTables written by flushes since the last compaction.
    flushed_since_compaction: usize,
    closed: bool,
}

impl LsmState {
    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::DatabaseClosed);
        }
        Ok(())
    }
}

/// An LSM tree over one locked database directory.
pub struct LsmStore {
    path: PathBuf,
    config: Config,
    stats: Arc<DatabaseStats>,
    state: RwLock<LsmState>,
}

impl std::fmt::Debug for LsmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LsmStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LsmStore {
    /// Opens the tree at `path`, replaying any WAL left by a previous run.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseLocked` if another instance has the directory
    /// open, `InvalidFormat` on a format version mismatch, and with
    /// corruption errors if the manifest, an SSTable or a WAL is damaged.
    pub fn open(path: &Path, config: Config, stats: Arc<DatabaseStats>) -> CoreResult<Self> {
        config.validate()?;
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        let state = recovery::recover(dir, &config, &stats)?;

        info!(
            path = %path.display(),
            sstables = state.ssts.len(),
            memtable = state.memtable.id(),
            "database opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            stats,
            state: RwLock::new(state),
        })
    }

    /// Directory of the database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the tree was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Applies a batch atomically.
    ///
    /// The batch is logged before it becomes visible. A failure while
    /// logging leaves the tree untouched. Once logged the batch is committed:
    /// a failed freeze, flush or compaction afterwards is logged, counted as
    /// an error and retried on the next write.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an invalid batch, `DatabaseClosed`
    /// after [`LsmStore::close`], or with the error of a failed WAL append.
    pub fn write(&self, batch: &WriteBatch) -> CoreResult<()> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write();
        state.ensure_open()?;
        if let Some(wal) = state.wal.as_mut() {
            wal.append_batch(batch)?;
        }
        state.memtable.apply(batch);

        if let Err(e) = self.maintain(&mut state) {
            self.stats.record_error();
            warn!(error = %e, "maintenance after write failed");
        }
        Ok(())
    }

    /// Looks up the live value of `key`.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or if an SSTable block cannot be read.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let state = self.state.read();
        state.ensure_open()?;

        if let Some(value) = state.memtable.get(key) {
            return Ok(value.map(<[u8]>::to_vec));
        }
        for table in &state.imm {
            if let Some(value) = table.get(key) {
                return Ok(value.map(<[u8]>::to_vec));
            }
        }
        for table in &state.ssts {
            if let Some(value) = table.get(key)? {
                return Ok(value);
            }
        }
        Ok(None)
    }

    /// Iterates over the live entries with `lower <= key <= upper`.
    ///
    /// The memtables are copied, so later writes are not observed. An
    /// inverted range yields nothing.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or if an SSTable block cannot be read.
    pub fn scan(&self, lower: &[u8], upper: &[u8]) -> CoreResult<BoundedIterator> {
        let state = self.state.read();
        state.ensure_open()?;

        let mut sources: Vec<Box<dyn KvIterator>> = Vec::new();
        if lower <= upper {
            sources.push(Box::new(state.memtable.snapshot(lower, upper)));
            for table in &state.imm {
                sources.push(Box::new(table.snapshot(lower, upper)));
            }
            for table in &state.ssts {
                let disjoint = match (table.first_key(), table.last_key()) {
                    (Some(first), Some(last)) => first > upper || last < lower,
                    _ => true,
                };
                if !disjoint {
                    sources.push(Box::new(SsTableIterator::seek(Arc::clone(table), lower)?));
                }
            }
        }
        BoundedIterator::new(MergeIterator::new(sources), upper.to_vec())
    }

    /// Writes every memtable, including the active one, to SSTables.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or on I/O errors.
    pub fn flush(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        self.flush_all(&mut state)
    }

    /// Flushes everything and merges all SSTables into one sorted run.
    ///
    /// # Errors
    ///
    /// Fails with `DatabaseClosed` or on I/O errors.
    pub fn compact(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        state.ensure_open()?;
        self.flush_all(&mut state)?;
        self.compact_tables(&mut state)
    }

    /// Makes everything written so far durable and releases the directory.
    ///
    /// With a WAL the log is synced; without one every memtable is flushed.
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors; the tree is closed regardless.
    pub fn close(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Ok(());
        }

        let result = match state.wal.as_mut() {
            Some(wal) => wal.sync(),
            None => self.flush_all(&mut state),
        };
        state.closed = true;
        state.wal = None;
        state.dir.release_lock();
        info!(path = %self.path.display(), "database closed");
        result
    }

    /// Whether [`LsmStore::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Describes the current shape of the tree.
    #[must_use]
    pub fn info(&self) -> StoreInfo {
        let state = self.state.read();
        StoreInfo {
            path: self.path.clone(),
            format_version: state.manifest.format_version,
            memtable_id: state.memtable.id(),
            memtable_bytes: state.memtable.approximate_size(),
            frozen_memtables: state.imm.len(),
            sstables: state.ssts.iter().map(|t| t.id()).collect(),
            sstable_bytes: state.ssts.iter().map(|t| t.size()).sum(),
            wal_enabled: state.wal.is_some(),
        }
    }

    /// Freezes, flushes and compacts as the configured thresholds demand.
    fn maintain(&self, state: &mut LsmState) -> CoreResult<()> {
        if state.memtable.approximate_size() >= self.config.target_sst_size {
            self.freeze(state)?;
        }
        while state.imm.len() > self.config.num_memtable_limit {
            self.flush_oldest(state)?;
        }
        let trigger = self.config.compaction_trigger;
        if trigger > 0 && state.flushed_since_compaction >= trigger {
            self.compact_tables(state)?;
        }
        Ok(())
    }

    /// Swaps in a fresh memtable and WAL.
    fn freeze(&self, state: &mut LsmState) -> CoreResult<()> {
        let id = state.manifest.allocate_id();
        let wal = self.new_wal(&state.dir, id)?;
        if let Some(old) = state.wal.as_mut() {
            old.sync()?;
        }

        let frozen = std::mem::replace(&mut state.memtable, MemTable::new(id));
        debug!(
            memtable = frozen.id(),
            bytes = frozen.approximate_size(),
            "memtable frozen"
        );
        state.wal = wal;
        state.imm.insert(0, Arc::new(frozen));
        Ok(())
    }

    fn new_wal(&self, dir: &DatabaseDir, id: u64) -> CoreResult<Option<Wal>> {
        if !self.config.enable_wal {
            return Ok(None);
        }
        let backend = FileBackend::open(&dir.wal_path(id))?;
        Ok(Some(Wal::new(Box::new(backend), self.config.sync_on_write)))
    }

    fn flush_all(&self, state: &mut LsmState) -> CoreResult<()> {
        if !state.memtable.is_empty() {
            self.freeze(state)?;
        }
        while !state.imm.is_empty() {
            self.flush_oldest(state)?;
        }
        Ok(())
    }

    /// Writes the oldest frozen memtable to an SSTable with the same id.
    fn flush_oldest(&self, state: &mut LsmState) -> CoreResult<()> {
        let Some(table) = state.imm.last().cloned() else {
            return Ok(());
        };
        let id = table.id();

        let sst = write_sstable(&state.dir, id, self.config.block_size, table.entries())?;
        state.imm.pop();
        if let Some(sst) = sst {
            state.ssts.insert(0, Arc::new(sst));
            state.manifest.ssts.insert(0, id);
            state.flushed_since_compaction += 1;
            state.dir.save_manifest(&state.manifest)?;
        }
        state.dir.remove_obsolete(&state.dir.wal_path(id));

        self.stats.record_flush();
        info!(memtable = id, entries = table.len(), "memtable flushed");
        Ok(())
    }
}

/// Writes `entries` to `<id>.sst`; returns `None` and writes nothing when
/// there are no entries.
fn write_sstable<'a>(
    dir: &DatabaseDir,
    id: u64,
    block_size: usize,
    entries: impl Iterator<Item = (&'a [u8], Option<&'a [u8]>)>,
) -> CoreResult<Option<SsTable>> {
    let mut builder = SsTableBuilder::new(block_size);
    for (key, value) in entries {
        builder.add(key, value)?;
    }
    if builder.is_empty() {
        return Ok(None);
    }
    let path = dir.sst_path(id);
    match builder.build(id, &path) {
        Ok(table) => Ok(Some(table)),
        Err(e) => {
            // A retry creates the same file name.
            dir.remove_obsolete(&path);
            Err(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A WAL backend whose appends can be made to fail.

    use super::LsmStore;
    use crate::wal::Wal;
    use colderstorage_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult, SyncMode};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// In-memory backend that rejects appends while `fail` is set.
    #[derive(Debug, Default)]
    pub(crate) struct FlakyBackend {
        inner: InMemoryBackend,
        fail: Arc<AtomicBool>,
    }

    impl FlakyBackend {
        pub(crate) fn new() -> (Self, Arc<AtomicBool>) {
            let backend = Self::default();
            let fail = Arc::clone(&backend.fail);
            (backend, fail)
        }
    }

    impl StorageBackend for FlakyBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
            }
            self.inner.append(data)
        }

        fn sync(&mut self, mode: SyncMode) -> StorageResult<()> {
            self.inner.sync(mode)
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }
    }

    impl LsmStore {
        /// Points the active memtable's log at a flaky backend.
        pub(crate) fn use_flaky_wal(&self) -> Arc<AtomicBool> {
            let (backend, fail) = FlakyBackend::new();
            self.state.write().wal = Some(Wal::new(Box::new(backend), true));
            fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> Config {
        Config::default()
            .target_sst_size(256)
            .block_size(64)
            .num_memtable_limit(1)
            .compaction_trigger(0)
    }

    fn put(store: &LsmStore, key: &str, value: &str) {
        let mut batch = WriteBatch::new();
        batch.put(key.as_bytes().to_vec(), value.as_bytes().to_vec());
        store.write(&batch).unwrap();
    }

    fn delete(store: &LsmStore, key: &str) {
        let mut batch = WriteBatch::new();
        batch.delete(key.as_bytes().to_vec());
        store.write(&batch).unwrap();
    }

    fn collect(mut it: BoundedIterator) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while it.is_valid() {
            out.push((
                String::from_utf8(it.key().to_vec()).unwrap(),
                String::from_utf8(it.value().unwrap().to_vec()).unwrap(),
            ));
            it.next().unwrap();
        }
        out
    }

    fn open(path: &Path, config: Config) -> LsmStore {
        LsmStore::open(path, config, Arc::new(DatabaseStats::new())).unwrap()
    }

    #[test]
    fn get_scan_and_delete() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Config::default());
        put(&store, "b", "2");
        put(&store, "a", "1");
        put(&store, "c", "3");
        delete(&store, "b");

        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), None);
        assert_eq!(
            collect(store.scan(b"a", b"c").unwrap()),
            vec![("a".into(), "1".into()), ("c".into(), "3".into())]
        );
        assert!(collect(store.scan(b"c", b"a").unwrap()).is_empty());
    }

    #[test]
    fn small_memtables_flush_to_sstables() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), small_config());
        for i in 0..200 {
            put(&store, &format!("key{i:04}"), &format!("value{i}"));
        }

        let info = store.info();
        assert!(!info.sstables.is_empty());
        assert!(info.frozen_memtables <= 1);
        for i in (0..200).step_by(17) {
            assert_eq!(
                store.get(format!("key{i:04}").as_bytes()).unwrap(),
                Some(format!("value{i}").into_bytes())
            );
        }
        assert_eq!(collect(store.scan(b"key", b"key\xff").unwrap()).len(), 200);
    }

    #[test]
    fn newer_values_shadow_flushed_ones() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Config::default());
        put(&store, "k", "old");
        put(&store, "gone", "x");
        store.flush().unwrap();
        put(&store, "k", "new");
        delete(&store, "gone");

        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.get(b"gone").unwrap(), None);
        assert_eq!(collect(store.scan(b"a", b"z").unwrap()), vec![("k".into(), "new".into())]);
    }

    #[test]
    fn compaction_drops_tombstones_and_keeps_data() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Config::default());
        put(&store, "a", "1");
        put(&store, "b", "2");
        store.flush().unwrap();
        delete(&store, "a");
        put(&store, "c", "3");
        store.flush().unwrap();
        assert_eq!(store.info().sstables.len(), 2);

        store.compact().unwrap();
        let info = store.info();
        assert_eq!(info.sstables.len(), 1);
        assert_eq!(
            collect(store.scan(b"a", b"z").unwrap()),
            vec![("b".into(), "2".into()), ("c".into(), "3".into())]
        );
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn reopen_replays_the_wal() {
        let temp = tempdir().unwrap();
        {
            let store = open(temp.path(), Config::default());
            put(&store, "durable", "yes");
            delete(&store, "never");
            store.close().unwrap();
        }
        let store = open(temp.path(), Config::default());
        assert_eq!(store.get(b"durable").unwrap(), Some(b"yes".to_vec()));
        assert_eq!(store.info().sstables.len(), 1);
    }

    #[test]
    fn without_wal_close_flushes() {
        let temp = tempdir().unwrap();
        let config = Config::default().enable_wal(false);
        {
            let store = open(temp.path(), config.clone());
            put(&store, "k", "v");
            store.close().unwrap();
        }
        let store = open(temp.path(), config);
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn closed_store_rejects_operations() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Config::default());
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.get(b"k"), Err(CoreError::DatabaseClosed)));
        let mut batch = WriteBatch::new();
        batch.put(b"k".to_vec(), b"v".to_vec());
        assert!(matches!(store.write(&batch), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn failed_wal_append_leaves_no_trace() {
        let temp = tempdir().unwrap();
        let store = open(temp.path(), Config::default());
        put(&store, "kept", "1");
        let fail = store.use_flaky_wal();
        fail.store(true, std::sync::atomic::Ordering::SeqCst);

        let mut batch = WriteBatch::new();
        batch.put(b"lost".to_vec(), b"2".to_vec());
        batch.delete(b"kept".to_vec());
        assert!(matches!(store.write(&batch), Err(CoreError::Storage(_))));

        assert_eq!(store.get(b"lost").unwrap(), None);
        assert_eq!(store.get(b"kept").unwrap(), Some(b"1".to_vec()));
        assert_eq!(collect(store.scan(b"a", b"z").unwrap()), vec![("kept".into(), "1".into())]);

        fail.store(false, std::sync::atomic::Ordering::SeqCst);
        store.write(&batch).unwrap();
        assert_eq!(collect(store.scan(b"a", b"z").unwrap()), vec![("lost".into(), "2".into())]);
    }

    #[test]
    fn failed_freeze_keeps_the_committed_write() {
        let temp = tempdir().unwrap();
        let stats = Arc::new(DatabaseStats::new());
        let config = Config::default().target_sst_size(64).compaction_trigger(0);
        let store = LsmStore::open(temp.path(), config, Arc::clone(&stats)).unwrap();

        // The next memtable's log path is taken by a directory.
        let next = store.state.read().manifest.next_id;
        let blocker = store.state.read().dir.wal_path(next);
        std::fs::create_dir(&blocker).unwrap();

        let mut batch = WriteBatch::new();
        batch.put(b"big".to_vec(), vec![b'x'; 128]);
        store.write(&batch).unwrap();
        assert_eq!(stats.snapshot().errors, 1);
        assert_eq!(store.info().frozen_memtables, 0);
        assert_eq!(store.get(b"big").unwrap(), Some(vec![b'x'; 128]));

        std::fs::remove_dir(&blocker).unwrap();
        put(&store, "small", "v");
        assert_eq!(store.info().frozen_memtables + store.info().sstables.len(), 1);
        assert_eq!(store.get(b"big").unwrap(), Some(vec![b'x'; 128]));
    }

    #[test]
    fn close_releases_the_lock() {
        let temp = tempdir().unwrap();
        let first = open(temp.path(), Config::default());
        assert!(matches!(
            LsmStore::open(temp.path(), Config::default(), Arc::new(DatabaseStats::new())),
            Err(CoreError::DatabaseLocked)
        ));
        first.close().unwrap();
        let second = open(temp.path(), Config::default());
        assert!(!second.is_closed());
    }
}
