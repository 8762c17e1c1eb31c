//! Cursors over raw ranges and statement results.
//!
//! Both kinds share one state machine:
//!
//! ```text
//! Open ──(past the last item)──► Exhausted ──close()──► Closed
//!   └──────────────────close()────────────────────────────┘
//! ```
//!
//! A [`ScanCursor`] stays exhausted until it is closed explicitly. A
//! [`ResultCursor`] closes itself as soon as it runs out of rows.

mod result;
mod scan;

pub use result::{ResultCursor, RowSource};
pub use scan::ScanCursor;

/// Lifecycle state of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Positioned on an item, or able to produce more.
    Open,
    /// Past the last item but still holding its resources.
    Exhausted,
    /// Resources released. Terminal.
    Closed,
}

/// Behavior shared by every cursor.
pub trait Cursor {
    /// Current lifecycle state.
    fn state(&self) -> CursorState;

    /// Whether the cursor can still produce items.
    fn is_open(&self) -> bool {
        self.state() == CursorState::Open
    }

    /// Releases the cursor's resources. Closing twice is a no-op.
    fn close(&mut self);
}
