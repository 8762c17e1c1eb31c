//! Backend over a single OS file.

use crate::backend::{StorageBackend, SyncMode};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A backend that stores its bytes in one file.
///
/// Write-ahead logs open their file with [`FileBackend::open`] and keep
/// appending; sorted tables are written once through
/// [`FileBackend::create_new`] and later reopened with
/// [`FileBackend::open_read_only`].
///
/// Reads seek a shared handle, so they are serialized by an internal lock.
///
/// # Example
///
/// ```no_run
/// use colderstorage_storage::{FileBackend, StorageBackend, SyncMode};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("00001.wal")).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync(SyncMode::Data).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
    /// Bytes past `size` may be left over from a failed append.
    dirty_tail: bool,
    read_only: bool,
}

impl FileBackend {
    /// Opens the file for appending, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Creates a fresh file, failing if one already exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists or cannot be created.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Opens an existing file for reads only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file, true)
    }

    fn from_file(path: &Path, file: File, read_only: bool) -> StorageResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
            dirty_tail: false,
            read_only,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if end > self.size {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.read_only {
            return Err(StorageError::ReadOnly(self.path.display().to_string()));
        }
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let file = self.file.get_mut();
        if self.dirty_tail {
            file.set_len(offset)?;
            self.dirty_tail = false;
        }
        file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = file.write_all(data) {
            // Drop any partial write so the size stays authoritative; a
            // failed truncate is retried before the next append.
            self.dirty_tail = file.set_len(offset).is_err();
            return Err(e.into());
        }
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self, mode: SyncMode) -> StorageResult<()> {
        if self.read_only {
            return Ok(());
        }
        let file = self.file.get_mut();
        match mode {
            SyncMode::Flush => file.flush()?,
            SyncMode::Data => file.sync_data()?,
            SyncMode::All => file.sync_all()?,
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }
}
