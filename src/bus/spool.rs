//! Spool-directory bus.
//!
//! Every channel is a directory; every message is a file in it:
//!
//! ```text
//! {state}/spool/kaku-events/
//! ├── 01710064800123456789-000000-4242.evt   # pending
//! └── .01710064800…evt.4242.7.tmp             # being written
//! ```
//!
//! File names sort by publish time, so a directory listing is the delivery
//! order. Publishing is an atomic rename, consuming is read-then-delete (on
//! ack). A message that cannot be read as UTF-8 is renamed to `.bad` and never
//! delivered. A `notify` watcher wakes the subscriber as soon as a file
//! lands; without one it falls back to polling at the caller's timeout.

use crossbeam::channel::{Receiver, bounded};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{Delivery, EventBus, Subscription};
use crate::error::{Error, IoContext, Result};
use crate::utils::fs::{remove_if_exists, write_atomic};
use crate::{debug, log};

const EXTENSION: &str = "evt";
const BAD_EXTENSION: &str = "bad";

pub struct SpoolBus {
    root: PathBuf,
    seq: AtomicU64,
}

impl SpoolBus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seq: AtomicU64::new(0),
        }
    }

    fn channel_dir(&self, channel: &str) -> Result<PathBuf> {
        let valid = !channel.is_empty()
            && channel
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !channel.starts_with('.');
        if !valid {
            return Err(Error::validation(format!("invalid channel name `{channel}`")));
        }
        Ok(self.root.join(channel))
    }

    fn message_name(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) % 1_000_000;
        format!("{nanos:020}-{seq:06}-{}.{EXTENSION}", std::process::id())
    }

    /// Messages still waiting in `channel`'s spool.
    pub fn pending(&self, channel: &str) -> Result<Vec<PathBuf>> {
        let dir = self.channel_dir(channel)?;
        list_messages(&dir)
    }
}

impl EventBus for SpoolBus {
    fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let dir = self.channel_dir(channel)?;
        let path = dir.join(self.message_name());
        write_atomic(&path, message.as_bytes()).at(&path)
    }

    fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        let dir = self.channel_dir(channel)?;
        fs::create_dir_all(&dir).at(&dir)?;

        let (wake_tx, wake_rx) = bounded(1);
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                // a full buffer already means "wake up"
                let _ = wake_tx.try_send(());
            }
        })
        .and_then(|mut watcher| {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });
        let watcher = match watcher {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                debug!("bus"; "watcher unavailable for {}, polling: {}", dir.display(), e);
                None
            }
        };

        Ok(Box::new(SpoolSubscription {
            dir,
            wake_rx,
            _watcher: watcher,
            queue: VecDeque::new(),
            in_flight: FxHashSet::default(),
        }))
    }
}

struct SpoolSubscription {
    dir: PathBuf,
    wake_rx: Receiver<()>,
    /// Must be kept alive for wake-ups.
    _watcher: Option<RecommendedWatcher>,
    queue: VecDeque<PathBuf>,
    /// Delivered but not yet acknowledged.
    in_flight: FxHashSet<PathBuf>,
}

impl SpoolSubscription {
    fn refill(&mut self) -> Result<()> {
        let in_flight = &self.in_flight;
        self.queue = list_messages(&self.dir)?
            .into_iter()
            .filter(|p| !in_flight.contains(p))
            .collect();
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<Delivery>> {
        while let Some(path) = self.queue.pop_front() {
            let message = match fs::read(&path).map(String::from_utf8) {
                Ok(Ok(message)) => message,
                // another consumer may have taken it since the listing
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    log!("bus"; "unreadable message [{}]: {}", path.display(), e);
                    quarantine(&path)?;
                    continue;
                }
                Ok(Err(_)) => {
                    log!("bus"; "message is not UTF-8 [{}]", path.display());
                    quarantine(&path)?;
                    continue;
                }
            };
            self.in_flight.insert(path.clone());
            return Ok(Some(Delivery::new(message.trim().to_string(), Some(path))));
        }
        Ok(None)
    }
}

impl Subscription for SpoolSubscription {
    fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        if self.queue.is_empty() {
            self.refill()?;
        }
        if let Some(delivery) = self.pop()? {
            return Ok(Some(delivery));
        }

        // wake on a watcher event, or poll when the timeout runs out
        let _ = self.wake_rx.recv_timeout(timeout);
        self.refill()?;
        self.pop()
    }

    fn ack(&mut self, delivery: &Delivery) -> Result<()> {
        if let Some(path) = &delivery.receipt {
            self.in_flight.remove(path);
            remove_if_exists(path).at(path)?;
        }
        Ok(())
    }
}

/// Move an undecodable message out of the delivery order, next to where it was.
fn quarantine(path: &Path) -> Result<()> {
    let bad = path.with_extension(BAD_EXTENSION);
    fs::rename(path, &bad).at(path)?;
    log!("bus"; "moved aside to [{}]", bad.display());
    Ok(())
}

fn list_messages(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut messages: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|e| e == EXTENSION)
                && path
                    .file_name()
                    .is_some_and(|n| !n.to_string_lossy().starts_with('.'))
        })
        .collect();
    messages.sort();
    Ok(messages)
}
