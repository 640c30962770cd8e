//! `kaku replay`: put unfinished events back on the bus.

use anyhow::Result;

use super::common::{open_services, publisher};
use crate::config::KakuConfig;
use crate::dispatch::replay as replay_events;
use crate::log;

pub fn replay(config: &KakuConfig) -> Result<()> {
    let services = open_services(config)?;
    let publisher = publisher(config, &services);
    let keys = replay_events(services.ledger.as_ref(), &publisher)?;
    if keys.is_empty() {
        log!("replay"; "nothing to replay");
    } else {
        log!("replay"; "republished {} events", keys.len());
    }
    Ok(())
}
