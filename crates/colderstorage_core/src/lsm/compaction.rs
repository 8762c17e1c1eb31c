//! Full compaction of the SSTable set.

use super::{LsmState, LsmStore};
use crate::error::CoreResult;
use crate::iterator::{KvIterator, MergeIterator};
use crate::sstable::{SsTable, SsTableBuilder, SsTableIterator};
use std::sync::Arc;
use tracing::info;

impl LsmStore {
    /// Merges every SSTable into new tables split at `target_sst_size`.
    ///
    /// All tables take part, so nothing older can hide behind a dropped
    /// tombstone. New tables are written before the manifest switches to
    /// them; a crash in between leaves orphans that the next open removes.
    pub(super) fn compact_tables(&self, state: &mut LsmState) -> CoreResult<()> {
        if state.ssts.is_empty() {
            state.flushed_since_compaction = 0;
            return Ok(());
        }

        let mut sources: Vec<Box<dyn KvIterator>> = Vec::with_capacity(state.ssts.len());
        for table in &state.ssts {
            sources.push(Box::new(SsTableIterator::first(Arc::clone(table))?));
        }
        let mut merged = MergeIterator::new(sources);

        let mut outputs: Vec<Arc<SsTable>> = Vec::new();
        let mut builder = SsTableBuilder::new(self.config.block_size);
        while merged.is_valid() {
            if let Some(value) = merged.value() {
                builder.add(merged.key(), Some(value))?;
            }
            merged.next()?;

            if builder.estimated_size() >= self.config.target_sst_size {
                let full = std::mem::replace(
                    &mut builder,
                    SsTableBuilder::new(self.config.block_size),
                );
                let id = state.manifest.allocate_id();
                outputs.push(Arc::new(full.build(id, &state.dir.sst_path(id))?));
            }
        }
        if !builder.is_empty() {
            let id = state.manifest.allocate_id();
            outputs.push(Arc::new(builder.build(id, &state.dir.sst_path(id))?));
        }

        let before = state.ssts.len();
        state.manifest.ssts = outputs.iter().map(|t| t.id()).collect();
        let obsolete = std::mem::replace(&mut state.ssts, outputs);
        state.flushed_since_compaction = 0;
        state.dir.save_manifest(&state.manifest)?;
        for table in &obsolete {
            state.dir.remove_obsolete(&state.dir.sst_path(table.id()));
        }

        self.stats.record_compaction();
        info!(before, after = state.ssts.len(), "compaction finished");
        Ok(())
    }
}
