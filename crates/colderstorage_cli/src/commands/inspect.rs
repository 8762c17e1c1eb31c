//! Inspect command implementation.

use super::{format_size, open};
use crate::Format;
use colderstorage_core::Database;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// On-disk format version.
    pub format_version: String,
    /// Whether writes are logged.
    pub wal_enabled: bool,
    /// Bytes in the active memtable.
    pub memtable_bytes: usize,
    /// Frozen memtables waiting for a flush.
    pub frozen_memtables: usize,
    /// Live SSTable ids, newest first.
    pub sstables: Vec<u64>,
    /// Total SSTable size in bytes.
    pub sstable_bytes: u64,
    /// Tables and their columns.
    pub tables: Vec<TableSummary>,
}

/// Columns of a single table.
#[derive(Debug, Serialize)]
pub struct TableSummary {
    /// Table name.
    pub name: String,
    /// `name type` pairs.
    pub columns: Vec<(String, String)>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = open(path, false)?;
    let result = inspect(&db);
    db.close()?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn inspect(db: &Database) -> InspectResult {
    let info = db.info().store;
    let tables = db
        .list_tables()
        .into_iter()
        .map(|name| {
            let columns = db
                .display_table(&name)
                .map(|schema| {
                    schema
                        .columns()
                        .iter()
                        .map(|c| (c.name.clone(), c.ty.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            TableSummary { name, columns }
        })
        .collect();

    InspectResult {
        path: info.path.display().to_string(),
        format_version: format!("{}.{}", info.format_version.0, info.format_version.1),
        wal_enabled: info.wal_enabled,
        memtable_bytes: info.memtable_bytes,
        frozen_memtables: info.frozen_memtables,
        sstables: info.sstables,
        sstable_bytes: info.sstable_bytes,
        tables,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("ColderStorage Database Inspection");
    println!("=================================");
    println!();
    println!("Path:           {}", result.path);
    println!("Format version: {}", result.format_version);
    println!("WAL:            {}", if result.wal_enabled { "enabled" } else { "disabled" });
    println!();
    println!("Storage:");
    println!("  Memtable:         {} bytes", format_size(result.memtable_bytes as u64));
    println!("  Frozen memtables: {}", result.frozen_memtables);
    println!("  SSTables:         {}", result.sstables.len());
    println!("  SSTable size:     {} bytes", format_size(result.sstable_bytes));
    println!();
    println!("Tables:");
    for table in &result.tables {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect();
        println!("  {} ({})", table.name, columns.join(", "));
    }
}
