//! Outbound webmention reconciliation.
//!
//! Compares the links in a freshly rendered article against the links
//! notified on earlier renders, then notifies new targets and targets whose
//! link was removed. A ledger key per `(source, href)` makes repeated runs
//! over unchanged HTML send nothing.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

use super::discover::{discover_endpoint, find_links};
use super::transport::{MentionTransport, Sent};
use crate::error::{Error, IoContext, Result};
use crate::ledger::Ledger;
use crate::utils::fs::{read_optional, write_atomic};
use crate::{debug, log};

/// Ledger key recording that `source` → `href` was notified.
pub fn outbound_key(source: &str, href: &str) -> String {
    format!("webmention::{source}::{href}")
}

/// One successfully notified link, cached in `{target}.outboundmentions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRecord {
    pub key: String,
    pub href: String,
    #[serde(rename = "wmUrl", default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundMentions(BTreeMap<String, OutboundRecord>);

impl OutboundMentions {
    pub fn load(path: &Path) -> Result<Self> {
        match read_optional(path).at(path)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| Error::corrupt(path, e)),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| Error::corrupt(path, e))?;
        write_atomic(path, &bytes).at(path)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Notifications accepted by the receiver.
    pub sent: usize,
    /// Links already notified on an earlier pass.
    pub skipped: usize,
    /// Links gone from the article since the last pass.
    pub removed: usize,
    /// Links with no endpoint, a failed send, or a network error.
    pub failed: usize,
}

#[derive(Debug)]
struct Working {
    key: String,
    href: String,
    removed: bool,
}

pub struct Reconciler<'a> {
    ledger: &'a dyn Ledger,
    transport: &'a dyn MentionTransport,
}

impl<'a> Reconciler<'a> {
    pub fn new(ledger: &'a dyn Ledger, transport: &'a dyn MentionTransport) -> Self {
        Self { ledger, transport }
    }

    /// Reconcile the outbound links of `html`, published at `source`, with
    /// the cache at `cache_path`. With `force`, links already notified are
    /// notified again.
    ///
    /// Failures for one link never stop the others. Ledger errors are
    /// collected per link; the cache is always saved before the first of
    /// them is returned, so sends already made stay recorded.
    pub fn reconcile(
        &self,
        source: &str,
        html: &str,
        cache_path: &Path,
        force: bool,
    ) -> Result<ReconcileReport> {
        log!("outbound"; "checking outbound webmentions [{}]", source);
        let source_url =
            Url::parse(source).map_err(|e| Error::validation(format!("`{source}`: {e}")))?;
        let mut cached = OutboundMentions::load(cache_path)?;
        let mut report = ReconcileReport::default();
        let mut first_error: Option<Error> = None;

        let links = find_links(&source_url, html);
        let found: FxHashSet<String> = links
            .iter()
            .filter(|href| *href != source)
            .map(|href| outbound_key(source, href))
            .collect();

        let mut working = Vec::new();
        for href in links.into_iter().filter(|href| href != source) {
            let key = outbound_key(source, &href);
            let notified = match self.ledger.exists(&key) {
                Ok(notified) => notified,
                Err(e) => {
                    log!("outbound"; "ledger lookup failed [{}]: {}", key, e);
                    report.failed += 1;
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            if notified && !force {
                debug!("outbound"; "already processed [{}]", key);
                report.skipped += 1;
                continue;
            }
            working.push(Working {
                key,
                href,
                removed: false,
            });
        }
        working.extend(
            cached
                .0
                .values()
                .filter(|record| !found.contains(&record.key))
                .map(|record| Working {
                    key: record.key.clone(),
                    href: record.href.clone(),
                    removed: true,
                }),
        );

        for item in &working {
            if item.removed {
                log!("outbound"; "link removed [{}]", item.key);
            }
            match self.notify(source, &item.href) {
                Ok(Some((endpoint, sent))) if sent.is_success() => {
                    report.sent += 1;
                    if !item.removed && !cached.contains(&item.key) {
                        cached.0.insert(
                            item.key.clone(),
                            OutboundRecord {
                                key: item.key.clone(),
                                href: item.href.clone(),
                                endpoint: Some(endpoint),
                                status: Some(sent.status),
                            },
                        );
                    }
                    if sent.redirected {
                        log!("outbound"; "webmention POST was redirected [{}]", item.href);
                    } else if !item.removed {
                        log!("outbound"; "webmention sent [{}]", item.href);
                        if let Err(e) = self.ledger.set(&item.key, &sent.status.to_string()) {
                            log!("outbound"; "ledger write failed [{}]: {}", item.key, e);
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Ok(Some((_, sent))) => {
                    log!("outbound"; "send returned status {} [{}]", sent.status, item.href);
                    report.failed += 1;
                }
                Ok(None) => {
                    debug!("outbound"; "no webmention endpoint [{}]", item.href);
                    report.failed += 1;
                }
                Err(e) => {
                    log!("outbound"; "{}", e);
                    report.failed += 1;
                }
            }
        }

        for item in working.iter().filter(|w| w.removed) {
            // keep the record when the ledger refuses, so the next pass retries
            if let Err(e) = self.ledger.delete(&item.key) {
                log!("outbound"; "ledger delete failed [{}]: {}", item.key, e);
                first_error.get_or_insert(e);
                continue;
            }
            cached.0.remove(&item.key);
            report.removed += 1;
        }

        cached.save(cache_path)?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn notify(
        &self,
        source: &str,
        href: &str,
    ) -> Result<Option<(String, Sent)>> {
        let Some(endpoint) = discover_endpoint(self.transport, href)? else {
            return Ok(None);
        };
        debug!("outbound"; "endpoint {} for {}", endpoint, href);
        let sent = self.transport.send(&endpoint, source, href)?;
        Ok(Some((endpoint, sent)))
    }
}
