//! Per-database accounting of cursors and output buffers.
//!
//! Every resource handed across an API boundary holds a [`ResourceGuard`].
//! Dropping or releasing the guard balances the books; whatever is still
//! acquired when the database closes is a leak.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kinds of tracked resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A raw range scan cursor.
    ScanCursor,
    /// A statement result cursor.
    ResultCursor,
    /// The shared output buffer of a foreign session.
    OutputBuffer,
}

impl ResourceKind {
    /// Every kind, in a stable order.
    pub const ALL: [Self; 3] = [Self::ScanCursor, Self::ResultCursor, Self::OutputBuffer];

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ScanCursor => "scan cursor",
            Self::ResultCursor => "result cursor",
            Self::OutputBuffer => "output buffer",
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::ScanCursor => 0,
            Self::ResultCursor => 1,
            Self::OutputBuffer => 2,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Acquire/release counters for one database.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    counters: [Counters; 3],
    /// Bumped by `reset`; guards from an older epoch release nothing.
    epoch: Mutex<u64>,
}

impl ResourceTracker {
    /// Creates a tracker with nothing acquired.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records an acquisition and returns the guard that releases it.
    #[must_use]
    pub fn acquire(self: &Arc<Self>, kind: ResourceKind) -> ResourceGuard {
        let epoch = *self.epoch.lock();
        self.counters[kind.slot()]
            .acquired
            .fetch_add(1, Ordering::Relaxed);
        ResourceGuard {
            tracker: Arc::clone(self),
            kind,
            epoch,
            released: false,
        }
    }

    /// Resources of `kind` acquired and not yet released.
    #[must_use]
    pub fn outstanding(&self, kind: ResourceKind) -> u64 {
        let c = &self.counters[kind.slot()];
        c.acquired
            .load(Ordering::Relaxed)
            .saturating_sub(c.released.load(Ordering::Relaxed))
    }

    /// Whether anything is still acquired.
    #[must_use]
    pub fn detect_leaks(&self) -> bool {
        ResourceKind::ALL.iter().any(|&k| self.outstanding(k) > 0)
    }

    /// Zeroes every counter. Guards acquired before the reset become inert.
    pub fn reset(&self) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        for c in &self.counters {
            c.acquired.store(0, Ordering::Relaxed);
            c.released.store(0, Ordering::Relaxed);
        }
    }

    /// Copies the counters of every kind.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ResourceCount> {
        ResourceKind::ALL
            .iter()
            .map(|&kind| {
                let c = &self.counters[kind.slot()];
                ResourceCount {
                    kind,
                    acquired: c.acquired.load(Ordering::Relaxed),
                    released: c.released.load(Ordering::Relaxed),
                }
            })
            .collect()
    }

    fn release(&self, kind: ResourceKind, epoch: u64) {
        let current = self.epoch.lock();
        if *current == epoch {
            self.counters[kind.slot()]
                .released
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Counters of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCount {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Total acquisitions.
    pub acquired: u64,
    /// Total releases.
    pub released: u64,
}

impl ResourceCount {
    /// Acquisitions not matched by a release.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Releases a tracked resource exactly once.
#[derive(Debug)]
pub struct ResourceGuard {
    tracker: Arc<ResourceTracker>,
    kind: ResourceKind,
    epoch: u64,
    released: bool,
}

impl ResourceGuard {
    /// Kind of the guarded resource.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Whether the resource was already released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Releases the resource. Later calls and the drop do nothing.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.tracker.release(self.kind, self.epoch);
        }
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.release();
    }
}
