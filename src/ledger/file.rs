//! Directory-backed ledger.
//!
//! Each key lives in its own file, `{blake3(key)}.json`, holding the key, the
//! value and an optional expiry (unix milliseconds). Writes go through
//! [`write_atomic`], so a reader in another process sees either the old record
//! or the new one. Expired records are removed the next time they are read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::Ledger;
use crate::debug;
use crate::error::{Error, IoContext, Result};
use crate::utils::fs::{read_optional, remove_if_exists, write_atomic};

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
}

impl Record {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

pub struct FileLedger {
    dir: PathBuf,
}

impl FileLedger {
    /// Open (creating if needed) a ledger rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).at(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hash.as_bytes())))
    }

    /// Read a live record, purging it if expired.
    fn read(&self, key: &str) -> Result<Option<Record>> {
        let path = self.path_for(key);
        self.read_path(&path, now_millis())
    }

    fn read_path(&self, path: &Path, now: u64) -> Result<Option<Record>> {
        let Some(raw) = read_optional(path).at(path)? else {
            return Ok(None);
        };
        let record: Record = serde_json::from_str(&raw).map_err(|e| Error::corrupt(path, e))?;
        if record.is_live(now) {
            return Ok(Some(record));
        }
        debug!("ledger"; "purging expired [{}]", record.key);
        remove_if_exists(path).at(path)?;
        Ok(None)
    }

    fn write(&self, record: &Record) -> Result<()> {
        let path = self.path_for(&record.key);
        let bytes = serde_json::to_vec(record).map_err(|e| Error::corrupt(&path, e))?;
        write_atomic(&path, &bytes).at(&path)
    }
}

impl Ledger for FileLedger {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read(key)?.map(|r| r.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write(&Record {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: None,
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let live = self.read(key)?.is_some();
        let path = self.path_for(key);
        remove_if_exists(&path).at(&path)?;
        Ok(live)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let Some(mut record) = self.read(key)? else {
            return Ok(false);
        };
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        record.expires_at = Some(now_millis().saturating_add(ttl_ms));
        self.write(&record)?;
        Ok(true)
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = now_millis();
        Ok(self
            .read(key)?
            .and_then(|r| r.expires_at)
            .map(|at| Duration::from_millis(at.saturating_sub(now))))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let now = now_millis();
        let entries = fs::read_dir(&self.dir).at(&self.dir)?;
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.at(&self.dir)?.path();
            // skips temp files (dot-prefixed) and anything foreign
            let is_record = path.extension().is_some_and(|e| e == "json")
                && path
                    .file_name()
                    .is_some_and(|n| !n.to_string_lossy().starts_with('.'));
            if !is_record {
                continue;
            }
            match self.read_path(&path, now) {
                Ok(Some(record)) if record.key.starts_with(prefix) => keys.push(record.key),
                Ok(_) => {}
                // a record removed between read_dir and read
                Err(Error::Persistence { source, .. })
                    if source.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::contract;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, FileLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::open(dir.path().join("ledger")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_set_get_delete() {
        let (_dir, ledger) = ledger();
        contract::set_get_delete(&ledger);
    }

    #[test]
    fn test_expiry() {
        let (_dir, ledger) = ledger();
        contract::expiry(&ledger);
    }

    #[test]
    fn test_prefix_keys() {
        let (_dir, ledger) = ledger();
        contract::prefix_keys(&ledger);
    }

    #[test]
    fn test_survives_reopen() {
        let (dir, ledger) = ledger();
        ledger.set("webmention::a::b", "200").unwrap();
        drop(ledger);

        let reopened = FileLedger::open(dir.path().join("ledger")).unwrap();
        assert!(reopened.exists("webmention::a::b").unwrap());
    }

    #[test]
    fn test_expired_record_is_purged() {
        let (_dir, ledger) = ledger();
        ledger.set("k", "v").unwrap();
        ledger.expire("k", Duration::ZERO).unwrap();
        assert!(ledger.get("k").unwrap().is_none());
        assert_eq!(fs::read_dir(ledger.dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let (_dir, ledger) = ledger();
        fs::write(ledger.path_for("k"), "not json").unwrap();
        assert!(matches!(ledger.get("k"), Err(Error::Corrupt { .. })));
    }
}
