//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod kv;
pub mod sql;

use colderstorage_core::{Config, Database};
use std::path::Path;

/// Opens the database at `path`. Only commands that write may create it.
fn open(path: &Path, create: bool) -> Result<Database, Box<dyn std::error::Error>> {
    if !create && !path.exists() {
        return Err(format!("No database found at {}", path.display()).into());
    }
    Ok(Database::open_with_config(
        path,
        Config::new().create_if_missing(create),
    )?)
}

/// Formats a byte count for display.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
