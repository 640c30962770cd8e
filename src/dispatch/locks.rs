//! Per-target mutual exclusion.

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Guard held while a post's sibling files are being written.
pub type TargetGuard = ArcMutexGuard<RawMutex, ()>;

/// One mutex per post target, created on first use.
#[derive(Default)]
pub struct TargetLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl TargetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no one else holds `target`.
    pub fn lock(&self, target: &Path) -> TargetGuard {
        let mutex = self
            .locks
            .entry(target.to_path_buf())
            .or_default()
            .value()
            .clone();
        mutex.lock_arc()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }
}
