//! Database directory management.
//!
//! Layout of a database directory:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock, one open instance per path
//! ├─ MANIFEST          # Format version, id allocator, live SSTables
//! ├─ 000007.wal        # WAL of the memtable with id 7
//! └─ 000004.sst        # Sorted table with id 4
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOCK_FILE: &str = "LOCK";

/// Extension of write-ahead log files.
pub const WAL_EXT: &str = "wal";
/// Extension of sorted table files.
pub const SST_EXT: &str = "sst";

/// An opened, exclusively locked database directory.
///
/// The lock is held until [`DatabaseDir::release_lock`] is called or this
/// value is dropped.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    lock_file: Option<File>,
}

impl DatabaseDir {
    /// Opens or creates a database directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another instance holds the lock (`DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file: Some(lock_file),
        })
    }

    /// Releases the directory lock early, letting another instance open it.
    pub fn release_lock(&mut self) {
        if let Some(file) = self.lock_file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!(path = %self.path.display(), error = %e, "failed to unlock database");
            }
        }
    }

    /// Path of the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the WAL for memtable `id`.
    #[must_use]
    pub fn wal_path(&self, id: u64) -> PathBuf {
        self.path.join(format!("{id:06}.{WAL_EXT}"))
    }

    /// Path of SSTable `id`.
    #[must_use]
    pub fn sst_path(&self, id: u64) -> PathBuf {
        self.path.join(format!("{id:06}.{SST_EXT}"))
    }

    /// Ids of all files with extension `ext`, ascending.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read.
    pub fn list_ids(&self, ext: &str) -> CoreResult<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Loads the manifest, or `None` for a fresh directory.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a corrupted manifest.
    pub fn load_manifest(&self) -> CoreResult<Option<Manifest>> {
        let data = match fs::read(self.path.join(MANIFEST_FILE)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(None);
        }
        Manifest::decode(&data).map(Some)
    }

    /// Saves the manifest atomically.
    ///
    /// Writes a temporary file, syncs it, renames it over `MANIFEST` and then
    /// syncs the directory so the rename itself is durable.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors; the previous manifest stays intact.
    pub fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&manifest.encode())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path.join(MANIFEST_FILE))?;
        self.sync_directory()
    }

    /// Removes a file, logging rather than failing when it cannot be removed.
    ///
    /// Used for files that are already unreferenced; a leftover is cleaned
    /// up on the next open.
    pub fn remove_obsolete(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove obsolete file"),
        }
    }

    /// Syncs directory entries after creating, renaming or deleting files.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be opened or synced.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Syncs directory entries after creating, renaming or deleting files.
    ///
    /// NTFS journals metadata, so there is nothing to do here.
    ///
    /// # Errors
    ///
    /// Never fails on this platform.
    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        let dir = DatabaseDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn missing_directory_without_create() {
        let temp = tempdir().unwrap();
        let result = DatabaseDir::open(&temp.path().join("absent"), false);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _first = DatabaseDir::open(temp.path(), true).unwrap();
        assert!(matches!(
            DatabaseDir::open(temp.path(), true),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(DatabaseDir::open(temp.path(), true).unwrap());
        assert!(DatabaseDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn release_lock_allows_reopen() {
        let temp = tempdir().unwrap();
        let mut first = DatabaseDir::open(temp.path(), true).unwrap();
        first.release_lock();
        assert!(DatabaseDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn manifest_round_trip_on_disk() {
        let temp = tempdir().unwrap();
        let dir = DatabaseDir::open(temp.path(), true).unwrap();
        assert!(dir.load_manifest().unwrap().is_none());

        let mut manifest = Manifest::default();
        let id = manifest.allocate_id();
        manifest.ssts.push(id);
        dir.save_manifest(&manifest).unwrap();

        assert_eq!(dir.load_manifest().unwrap(), Some(manifest));
        assert!(!temp.path().join(MANIFEST_TEMP).exists());
    }

    #[test]
    fn lists_ids_by_extension() {
        let temp = tempdir().unwrap();
        let dir = DatabaseDir::open(temp.path(), true).unwrap();
        File::create(dir.wal_path(12)).unwrap();
        File::create(dir.wal_path(3)).unwrap();
        File::create(dir.sst_path(5)).unwrap();
        File::create(temp.path().join("notes.wal.bak")).unwrap();

        assert_eq!(dir.list_ids(WAL_EXT).unwrap(), vec![3, 12]);
        assert_eq!(dir.list_ids(SST_EXT).unwrap(), vec![5]);
    }
}
