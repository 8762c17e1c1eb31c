//! Startup: manifest load, orphan cleanup and WAL replay.

use super::{write_sstable, LsmState};
use crate::config::Config;
use crate::dir::{DatabaseDir, SST_EXT, WAL_EXT};
use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::sstable::SsTable;
use crate::stats::DatabaseStats;
use crate::wal::{Wal, WalRecord};
use colderstorage_storage::FileBackend;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rebuilds the in-memory state of a directory.
///
/// Every WAL that is not yet covered by an SSTable is replayed and written
/// out as the SSTable of the same id, so the tree always starts with an
/// empty memtable.
pub(super) fn recover(
    dir: DatabaseDir,
    config: &Config,
    stats: &DatabaseStats,
) -> CoreResult<LsmState> {
    let mut manifest = match dir.load_manifest()? {
        Some(manifest) => {
            if manifest.format_version.0 != config.format_version.0 {
                return Err(CoreError::invalid_format(format!(
                    "incompatible format version: database is v{}.{}, expected v{}.{}",
                    manifest.format_version.0,
                    manifest.format_version.1,
                    config.format_version.0,
                    config.format_version.1
                )));
            }
            manifest
        }
        None => {
            let manifest = Manifest::new(config.format_version);
            dir.save_manifest(&manifest)?;
            manifest
        }
    };

    let live: HashSet<u64> = manifest.ssts.iter().copied().collect();
    for id in dir.list_ids(SST_EXT)? {
        manifest.reserve_through(id);
        if !live.contains(&id) {
            warn!(sstable = id, "removing SSTable missing from the manifest");
            dir.remove_obsolete(&dir.sst_path(id));
        }
    }

    let mut ssts = Vec::with_capacity(manifest.ssts.len());
    for &id in &manifest.ssts {
        let backend = FileBackend::open_read_only(&dir.sst_path(id))?;
        ssts.push(Arc::new(SsTable::open(id, Box::new(backend))?));
    }

    let wal_ids = dir.list_ids(WAL_EXT)?;
    for &id in &wal_ids {
        manifest.reserve_through(id);
    }
    for id in wal_ids {
        let path = dir.wal_path(id);
        if live.contains(&id) {
            dir.remove_obsolete(&path);
            continue;
        }

        let memtable = replay(&dir, id)?;
        if let Some(sst) = write_sstable(&dir, id, config.block_size, memtable.entries())? {
            ssts.insert(0, Arc::new(sst));
            manifest.ssts.insert(0, id);
            dir.save_manifest(&manifest)?;
            stats.record_flush();
            info!(wal = id, entries = memtable.len(), "recovered write-ahead log");
        }
        dir.remove_obsolete(&path);
    }

    let id = manifest.allocate_id();
    let wal = if config.enable_wal {
        let backend = FileBackend::open(&dir.wal_path(id))?;
        Some(Wal::new(Box::new(backend), config.sync_on_write))
    } else {
        None
    };

    Ok(LsmState {
        dir,
        memtable: MemTable::new(id),
        wal,
        imm: Vec::new(),
        ssts,
        manifest,
        flushed_since_compaction: 0,
        closed: false,
    })
}

/// Applies every intact record of `<id>.wal` to a fresh memtable.
///
/// A torn final record ends the log; a checksum or framing error anywhere
/// else is fatal.
fn replay(dir: &DatabaseDir, id: u64) -> CoreResult<MemTable> {
    let backend = FileBackend::open_read_only(&dir.wal_path(id))?;
    let wal = Wal::new(Box::new(backend), false);

    let mut memtable = MemTable::new(id);
    let mut records = 0usize;
    for record in wal.iter()? {
        let (_, record) = record?;
        match record {
            WalRecord::Batch(batch) => memtable.apply(&batch),
        }
        records += 1;
    }
    debug!(wal = id, records, "replayed write-ahead log");
    Ok(memtable)
}
