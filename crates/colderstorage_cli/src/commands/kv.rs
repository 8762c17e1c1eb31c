//! Raw key-value commands.

use super::open;
use std::path::Path;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Runs the put command.
pub fn put(path: &Path, key: &str, value: &str) -> CmdResult {
    let mut db = open(path, true)?;
    db.put(key.as_bytes(), value.as_bytes())?;
    db.close()?;
    Ok(())
}

/// Runs the get command.
pub fn get(path: &Path, key: &str) -> CmdResult {
    let mut db = open(path, false)?;
    let value = db.get(key.as_bytes())?;
    db.close()?;
    match value {
        Some(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        None => Err(format!("Key not found: {key}").into()),
    }
}

/// Runs the delete command.
pub fn delete(path: &Path, key: &str) -> CmdResult {
    let mut db = open(path, false)?;
    db.delete(key.as_bytes())?;
    db.close()?;
    Ok(())
}

/// Runs the scan command.
pub fn scan(path: &Path, lower: &str, upper: &str, limit: Option<usize>) -> CmdResult {
    let mut db = open(path, false)?;
    let entries = collect(&db, lower.as_bytes(), upper.as_bytes(), limit)?;
    db.close()?;

    for (key, value) in &entries {
        println!(
            "{}\t{}",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        );
    }
    Ok(())
}

/// Reads up to `limit` entries of `[lower, upper]`.
fn collect(
    db: &colderstorage_core::Database,
    lower: &[u8],
    upper: &[u8],
    limit: Option<usize>,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Box<dyn std::error::Error>> {
    let cursor = db.scan(lower, upper)?;
    let mut entries = Vec::new();
    for entry in cursor.take(limit.unwrap_or(usize::MAX)) {
        entries.push(entry?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_then_scan_with_limit() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        for key in ["a", "b", "c"] {
            put(&path, key, "v").unwrap();
        }
        delete(&path, "b").unwrap();

        let mut db = open(&path, false).unwrap();
        let entries = collect(&db, b"a", b"c", None).unwrap();
        assert_eq!(entries.len(), 2);
        let entries = collect(&db, b"a", b"c", Some(1)).unwrap();
        assert_eq!(entries, vec![(b"a".to_vec(), b"v".to_vec())]);
        db.close().unwrap();
        assert!(!db.detect_leaks());
    }

    #[test]
    fn read_commands_need_an_existing_database() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing");
        assert!(get(&path, "k").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn missing_key_is_an_error() {
        let temp = tempdir().unwrap();
        put(temp.path(), "k", "v").unwrap();
        assert!(get(temp.path(), "k").is_ok());
        assert!(get(temp.path(), "other").is_err());
    }
}
