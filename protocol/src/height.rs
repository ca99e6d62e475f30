//! # Height Oracle
//!
//! All time in the escrow engine is measured in ledger heights, never wall
//! clock. The oracle is read-only from the engine's point of view. Only the
//! host (or a test) advances it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current ledger height. Monotonically non-decreasing.
pub trait HeightOracle: Send + Sync {
    fn current_height(&self) -> u64;
}

/// A height counter advanced by hand.
///
/// Used by tests and by the node's replay mode, where each script step says
/// how many blocks to advance before it runs.
#[derive(Debug, Default)]
pub struct ManualHeight {
    height: AtomicU64,
}

impl ManualHeight {
    pub fn new(start: u64) -> Self {
        Self {
            height: AtomicU64::new(start),
        }
    }

    /// Advance by `blocks`, saturating at `u64::MAX`. Returns the new height.
    pub fn advance(&self, blocks: u64) -> u64 {
        let mut current = self.height.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(blocks);
            match self.height.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Jump forward to `height`. Moving backwards is ignored; the returned
    /// value is the height after the call.
    pub fn set(&self, height: u64) -> u64 {
        self.height.fetch_max(height, Ordering::AcqRel).max(height)
    }
}

impl HeightOracle for ManualHeight {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }
}
