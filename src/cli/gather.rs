//! `kaku gather`: one scan of the content tree from the producer side.

use std::path::PathBuf;

use anyhow::Result;

use super::common::{open_services, publisher};
use crate::config::KakuConfig;
use crate::event::GatherRequest;
use crate::gather::Gatherer;
use crate::log;

pub fn gather(config: &KakuConfig, file: Option<PathBuf>, force: bool) -> Result<()> {
    let services = open_services(config)?;
    let publisher = publisher(config, &services);
    let request = GatherRequest { file, force };

    let report = Gatherer::new(&config.paths.content, &publisher).run(&request)?;
    log!(
        "gather";
        "published {} events ({} unchanged) to [{}]",
        report.emitted,
        report.unchanged,
        publisher.channel()
    );
    Ok(())
}
