//! Inbound webmentions stored per post in `{target}.mentions`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

use super::discover::meta_status;
use super::transport::MentionTransport;
use crate::error::{Error, IoContext, Result};
use crate::utils::fs::{read_optional, write_atomic};
use crate::{debug, log};

/// Timestamp format for the `updated` field of stored mentions.
const UPDATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A received webmention, as delivered on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    #[serde(rename = "targetURL")]
    pub target_url: String,
    #[serde(rename = "postDate", default, skip_serializing_if = "Option::is_none")]
    pub post_date: Option<String>,
    #[serde(rename = "vouchDomain", default, skip_serializing_if = "Option::is_none")]
    pub vouch_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vouched: Option<bool>,
    /// Author card; receivers send an object, a bare name or a URL list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcard: Option<Value>,
    /// Everything else the receiver recorded (parsed microformats, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Mention {
    pub fn source(&self) -> Result<Url> {
        Url::parse(self.source_url.trim())
            .map_err(|e| Error::validation(format!("bad sourceURL `{}`: {e}", self.source_url)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMention {
    pub created: Option<String>,
    pub updated: Option<String>,
    pub mention: Mention,
}

/// `host[:port]` of a URL.
fn netloc(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Storage key for a mention from `source`.
pub fn mention_key(source: &Url) -> String {
    format!("mention::{}::{}", netloc(source), source.path())
}

/// Every inbound mention of one post, keyed by `mention::{netloc}::{path}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboundMentions(BTreeMap<String, StoredMention>);

impl InboundMentions {
    /// Read the mentions file; a missing file is an empty set.
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

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StoredMention> {
        self.0.get(key)
    }

    pub fn mentions(&self) -> impl Iterator<Item = &Mention> {
        self.0.values().map(|stored| &stored.mention)
    }

    /// Key of the stored mention whose source has the same host and path as
    /// `source`.
    pub fn scan(&self, source: &Url) -> Option<String> {
        let (host, path) = (netloc(source), source.path());
        self.0
            .iter()
            .find(|(_, stored)| {
                stored
                    .mention
                    .source()
                    .is_ok_and(|url| netloc(&url) == host && url.path() == path)
            })
            .map(|(key, _)| key.clone())
    }

    /// Replace the payload of `found`, or insert under a fresh key. Returns
    /// the key written.
    pub fn upsert(
        &mut self,
        found: Option<String>,
        mention: Mention,
        now: &chrono::NaiveDateTime,
    ) -> Result<String> {
        if let Some(key) = found
            && let Some(stored) = self.0.get_mut(&key)
        {
            stored.updated = Some(now.format(UPDATED_FORMAT).to_string());
            stored.mention = mention;
            return Ok(key);
        }

        let key = mention_key(&mention.source()?);
        self.0.insert(
            key.clone(),
            StoredMention {
                created: mention.post_date.clone(),
                updated: None,
                mention,
            },
        );
        Ok(key)
    }

    /// Re-fetch every mention source and drop those that are gone (HTTP 410,
    /// literally or via a status meta tag). Fetch failures keep the mention.
    /// Returns the removed keys.
    pub fn verify(&mut self, transport: &dyn MentionTransport) -> Vec<String> {
        let gone: Vec<String> = self
            .0
            .iter()
            .filter(|(key, stored)| is_gone(transport, key, &stored.mention))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &gone {
            self.0.remove(key);
        }
        gone
    }
}

fn is_gone(transport: &dyn MentionTransport, key: &str, mention: &Mention) -> bool {
    match transport.fetch(&mention.source_url) {
        Ok(page) if page.status == 410 => {
            log!("mention"; "source gone, removing [{}]", key);
            true
        }
        Ok(page) if meta_status(&page.body) == Some(410) => {
            log!("mention"; "source gone (via http-equiv), removing [{}]", key);
            true
        }
        Ok(_) => false,
        Err(e) => {
            debug!("mention"; "keeping [{}]: {}", key, e);
            false
        }
    }
}
