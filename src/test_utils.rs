//! Shared fixtures for unit tests.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use tempfile::TempDir;

use crate::config::KakuConfig;
use crate::embed::templates::POST_MD;
use crate::error::{Error, Result};
use crate::mention::{MentionTransport, Page, Sent};
use crate::post::{PostStore, Target};

/// A throwaway site rooted in a temp directory.
pub struct TestSite {
    pub dir: TempDir,
    pub config: KakuConfig,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = KakuConfig::rooted(dir.path());
        config.site.title = "Test".into();
        config.site.base_url = "https://bear.im".into();
        config.site.base_route = "/bearlog/".into();
        config.site.author = "bear".into();
        Self { dir, config }
    }

    pub fn store(&self) -> PostStore {
        PostStore::new(&self.config, POST_MD)
    }

    /// Write `{content}/{rel}.md`.
    pub fn write_md(&self, rel: &str, content: &str) -> Target {
        let target = Target::new(self.config.paths.content.join(rel));
        let md = target.md();
        fs::create_dir_all(md.parent().unwrap()).unwrap();
        fs::write(&md, content).unwrap();
        target
    }
}

/// Scripted [`MentionTransport`]. Unscripted fetches fail like an
/// unreachable host; unscripted sends are accepted with 202.
#[derive(Default)]
pub struct FakeTransport {
    pages: Mutex<FxHashMap<String, Page>>,
    responses: Mutex<FxHashMap<String, Option<Sent>>>,
    sends: Mutex<Vec<(String, String, String)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, url: &str, status: u16, body: &str) {
        self.pages.lock().insert(
            url.to_string(),
            Page {
                url: url.to_string(),
                status,
                links: Vec::new(),
                body: body.to_string(),
            },
        );
    }

    /// `target` advertises `endpoint` in its markup.
    pub fn endpoint(&self, target: &str, endpoint: &str) {
        self.page(
            target,
            200,
            &format!(r#"<html><head><link rel="webmention" href="{endpoint}"></head></html>"#),
        );
    }

    /// Script the response of `endpoint`; `None` fails like a network error.
    pub fn respond(&self, endpoint: &str, sent: Option<Sent>) {
        self.responses.lock().insert(endpoint.to_string(), sent);
    }

    /// `(endpoint, source, target)` of every send so far.
    pub fn sends(&self) -> Vec<(String, String, String)> {
        self.sends.lock().clone()
    }

    /// Targets notified so far, in order.
    pub fn sent_targets(&self) -> Vec<String> {
        self.sends.lock().iter().map(|(_, _, t)| t.clone()).collect()
    }

    pub fn clear_sends(&self) {
        self.sends.lock().clear();
    }
}

impl MentionTransport for FakeTransport {
    fn fetch(&self, url: &str) -> Result<Page> {
        self.pages
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::network(url, "unreachable"))
    }

    fn send(&self, endpoint: &str, source: &str, target: &str) -> Result<Sent> {
        let scripted = self.responses.lock().get(endpoint).cloned();
        let sent = match scripted {
            Some(None) => return Err(Error::network(endpoint, "connection reset")),
            Some(Some(sent)) => sent,
            None => Sent {
                status: 202,
                redirected: false,
            },
        };
        self.sends
            .lock()
            .push((endpoint.into(), source.into(), target.into()));
        Ok(sent)
    }
}
