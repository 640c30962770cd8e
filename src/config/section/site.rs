//! `[site]` section configuration.

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Public identity of the site and index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site title, used on index and tombstone pages.
    pub title: String,
    /// Scheme + host, e.g. `https://bear.im`.
    pub base_url: String,
    /// URL path prefix every post lives under, e.g. `/bearlog/`.
    pub base_route: String,
    /// Author recorded on posts created from micropub payloads.
    pub author: String,
    /// Number of newest posts rendered into the index page.
    pub index_articles: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            base_url: "http://localhost".into(),
            base_route: "/".into(),
            author: String::new(),
            index_articles: 15,
        }
    }
}

impl SiteConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => diag.error("site.base_url", "must be an absolute http(s) url"),
        }
        if !self.base_route.starts_with('/') || !self.base_route.ends_with('/') {
            diag.error("site.base_route", "must start and end with `/`");
        }
        if self.index_articles == 0 {
            diag.error("site.index_articles", "must be greater than zero");
        }
    }
}
