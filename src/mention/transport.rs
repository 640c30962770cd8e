//! HTTP seam for webmention discovery, delivery and verification.

use reqwest::blocking::Client;
use reqwest::header::LINK;
use url::Url;

use crate::config::WebmentionConfig;
use crate::error::{Error, Result};

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    /// Raw `Link` header values.
    pub links: Vec<String>,
    pub body: String,
}

/// Response to a webmention notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    pub status: u16,
    /// The endpoint answered with a redirect that was followed.
    pub redirected: bool,
}

impl Sent {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Network collaborator. Every failure is reported as [`Error::Network`].
pub trait MentionTransport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Page>;

    /// Notify `endpoint` that `source` links to `target`.
    fn send(&self, endpoint: &str, source: &str, target: &str) -> Result<Sent>;
}

/// Blocking reqwest transport with bounded timeouts.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &WebmentionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::network("http client", e))?;
        Ok(Self { client })
    }
}

impl MentionTransport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Page> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::network(url, e))?;

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let links = resp
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = resp.text().map_err(|e| Error::network(url, e))?;

        Ok(Page {
            url: final_url,
            status,
            links,
            body,
        })
    }

    fn send(&self, endpoint: &str, source: &str, target: &str) -> Result<Sent> {
        let requested = Url::parse(endpoint).map_err(|e| Error::network(endpoint, e))?;
        let resp = self
            .client
            .post(requested.clone())
            .form(&[("source", source), ("target", target)])
            .send()
            .map_err(|e| Error::network(endpoint, e))?;

        Ok(Sent {
            status: resp.status().as_u16(),
            redirected: resp.url() != &requested,
        })
    }
}
