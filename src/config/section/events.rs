//! `[events]` and `[webmention]` section configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigDiagnostics;

/// Event bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Bus channel producers publish to and the worker listens on.
    pub channel: String,
    /// Seconds a handled event stays in the ledger.
    pub retention: u64,
    /// Upper bound on how long the worker sleeps between spool checks.
    pub poll_interval_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel: "kaku-events".into(),
            retention: 86_400,
            poll_interval_ms: 500,
        }
    }
}

impl EventsConfig {
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.channel.is_empty()
            || !self
                .channel
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            diag.error("events.channel", "must be a non-empty [A-Za-z0-9._-] name");
        }
        if self.retention == 0 {
            diag.error("events.retention", "must be greater than zero");
        }
    }
}

/// Outbound/inbound webmention network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebmentionConfig {
    /// Per-request timeout in seconds (discovery, send, verification).
    pub timeout: u64,
    pub user_agent: String,
    /// Re-send every outbound mention on each render, not only new ones.
    pub resend_on_render: bool,
}

impl Default for WebmentionConfig {
    fn default() -> Self {
        Self {
            timeout: 10,
            user_agent: concat!("kaku/", env!("CARGO_PKG_VERSION")).into(),
            resend_on_render: false,
        }
    }
}

impl WebmentionConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.timeout == 0 {
            diag.error("webmention.timeout", "must be greater than zero");
        }
    }
}
