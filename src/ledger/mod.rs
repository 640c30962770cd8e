//! Durable key-value ledger.
//!
//! The ledger is both the event store (payloads keyed by event key) and the
//! outbound webmention dedup table (`webmention::{source}::{href}` facts).
//! Expiry follows the usual key-value store semantics: `set` clears any TTL,
//! expired keys read as absent.
//!
//! - [`FileLedger`]: one JSON record per key under the state directory
//! - [`MemoryLedger`]: process-local map, used by tests and one-shot runs

mod file;
mod memory;

pub use file::FileLedger;
pub use memory::MemoryLedger;

use std::time::Duration;

use crate::error::Result;

pub trait Ledger: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, replacing any previous value and TTL.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove `key`. Returns whether it was present.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Expire `key` after `ttl`. Returns `false` when the key is absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining lifetime; `None` for absent keys and keys without TTL.
    fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Live keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every ledger implementation must share.

    use super::*;

    pub fn set_get_delete(ledger: &dyn Ledger) {
        assert_eq!(ledger.get("a").unwrap(), None);
        assert!(!ledger.exists("a").unwrap());

        ledger.set("a", "1").unwrap();
        ledger.set("a", "2").unwrap();
        assert_eq!(ledger.get("a").unwrap().as_deref(), Some("2"));
        assert!(ledger.exists("a").unwrap());

        assert!(ledger.delete("a").unwrap());
        assert!(!ledger.delete("a").unwrap());
        assert_eq!(ledger.get("a").unwrap(), None);
    }

    pub fn expiry(ledger: &dyn Ledger) {
        assert!(!ledger.expire("missing", Duration::from_secs(1)).unwrap());

        ledger.set("keep", "v").unwrap();
        assert_eq!(ledger.ttl("keep").unwrap(), None);
        assert!(ledger.expire("keep", Duration::from_secs(3600)).unwrap());
        let ttl = ledger.ttl("keep").unwrap().unwrap();
        assert!(ttl > Duration::from_secs(3500) && ttl <= Duration::from_secs(3600));

        // set clears the ttl
        ledger.set("keep", "v2").unwrap();
        assert_eq!(ledger.ttl("keep").unwrap(), None);

        ledger.set("gone", "v").unwrap();
        assert!(ledger.expire("gone", Duration::ZERO).unwrap());
        assert_eq!(ledger.get("gone").unwrap(), None);
        assert!(!ledger.keys("").unwrap().contains(&"gone".to_string()));
    }

    pub fn prefix_keys(ledger: &dyn Ledger) {
        ledger.set("kaku-event::post::create::2", "{}").unwrap();
        ledger.set("kaku-event::post::create::1", "{}").unwrap();
        ledger.set("webmention::https://a::https://b", "200").unwrap();

        assert_eq!(
            ledger.keys("kaku-event::").unwrap(),
            [
                "kaku-event::post::create::1".to_string(),
                "kaku-event::post::create::2".to_string()
            ]
        );
        assert_eq!(ledger.keys("").unwrap().len(), 3);
    }
}
