//! Compact command implementation.

use super::{format_size, open};
use std::path::Path;
use tracing::info;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = open(path, false)?;
    let before = db.info().store;

    println!("Compacting {}", path.display());
    db.compact()?;
    let after = db.info().store;
    db.close()?;
    info!(
        sstables_before = before.sstables.len(),
        sstables_after = after.sstables.len(),
        "compaction finished"
    );

    println!();
    println!("  SSTables:    {} -> {}", before.sstables.len(), after.sstables.len());
    println!(
        "  Size before: {} bytes",
        format_size(before.sstable_bytes + before.memtable_bytes as u64)
    );
    println!("  Size after:  {} bytes", format_size(after.sstable_bytes));
    println!("✓ Compaction complete");
    Ok(())
}
