//! `kaku listen`: the long-running worker.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::common::open_services;
use crate::config::KakuConfig;
use crate::dispatch::{Dispatcher, Worker, is_shutdown};
use crate::log;
use crate::render::TemplateSet;

pub fn listen(config: &KakuConfig) -> Result<()> {
    let templates = TemplateSet::load(config).context("failed to load templates")?;
    let services = open_services(config)?;
    let bus = Arc::clone(&services.bus);
    let dispatcher = Dispatcher::new(config.clone(), templates, services);

    let mut subscription = bus
        .subscribe(&config.events.channel)
        .with_context(|| format!("failed to subscribe to [{}]", config.events.channel))?;
    let stats = Worker::new(&dispatcher).run(subscription.as_mut(), is_shutdown)?;

    log!("listen"; "shutting down after {} events", stats.total());
    Ok(())
}
