//! In-process ledger.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

use super::Ledger;
use crate::error::Result;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<FxHashMap<String, Entry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries, then run `f` on the live map.
    fn with_live<T>(&self, f: impl FnOnce(&mut FxHashMap<String, Entry>) -> T) -> T {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_live(now));
        f(&mut entries)
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.with_live(|entries| entries.get(key).map(|e| e.value.clone())))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_live(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
        });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.with_live(|entries| entries.remove(key).is_some()))
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.with_live(|entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }))
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self.with_live(|entries| {
            entries
                .get(key)
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(Instant::now()))
        }))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.with_live(|entries| {
            let mut keys: Vec<_> = entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            keys
        }))
    }
}
