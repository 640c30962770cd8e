//! Wiring shared across CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::bus::{Publisher, SpoolBus};
use crate::config::KakuConfig;
use crate::dispatch::Services;
use crate::ledger::FileLedger;
use crate::mention::HttpTransport;

/// Open the on-disk ledger and spool bus, and the HTTP transport.
pub fn open_services(config: &KakuConfig) -> Result<Services> {
    let ledger_dir = config.paths.ledger_dir();
    let ledger = FileLedger::open(&ledger_dir)
        .with_context(|| format!("failed to open ledger at {}", ledger_dir.display()))?;
    let transport =
        HttpTransport::new(&config.webmention).context("failed to build HTTP client")?;

    Ok(Services {
        ledger: Arc::new(ledger),
        bus: Arc::new(SpoolBus::new(config.paths.spool_dir())),
        transport: Arc::new(transport),
    })
}

pub fn publisher(config: &KakuConfig, services: &Services) -> Publisher {
    Publisher::new(
        Arc::clone(&services.ledger),
        Arc::clone(&services.bus),
        config.events.channel.clone(),
    )
}
