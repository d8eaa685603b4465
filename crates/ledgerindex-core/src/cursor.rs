//! Sync cursor: the indexer's resume point.
//!
//! The cursor is never stored on its own: it is the height of the highest
//! committed block, re-derived from the [`LedgerStore`](crate::store::LedgerStore)
//! at the start of every pass.

use serde::{Deserialize, Serialize};

/// The highest fully committed block height, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    height: Option<u64>,
}

impl SyncCursor {
    /// A cursor at the given committed height (`None` = nothing committed yet).
    pub fn new(height: Option<u64>) -> Self {
        Self { height }
    }

    /// The last committed height.
    pub fn height(&self) -> Option<u64> {
        self.height
    }

    /// Advance after `height` has been committed.
    pub fn advance(&mut self, height: u64) {
        self.height = Some(height);
    }

    /// Returns the next height to ingest (genesis when nothing is committed).
    pub fn next_height(&self) -> u64 {
        match self.height {
            Some(h) => h + 1,
            None => 0,
        }
    }

    /// Returns `true` if `head` has already been committed.
    pub fn has_reached(&self, head: u64) -> bool {
        self.height.is_some_and(|h| h >= head)
    }

    /// Number of blocks between the cursor and `head` (inclusive).
    pub fn lag(&self, head: u64) -> u64 {
        (head + 1).saturating_sub(self.next_height())
    }
}
