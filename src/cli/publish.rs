//! `kaku publish`: inject one event from a JSON file or stdin.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use super::common::{open_services, publisher};
use crate::config::KakuConfig;
use crate::event::{Envelope, Event};
use crate::log;

pub fn publish(config: &KakuConfig, input: &Path) -> Result<()> {
    let raw = read_input(input)?;
    let envelope = prepare(&raw)?;

    let services = open_services(config)?;
    let key = publisher(config, &services).publish(&envelope)?;
    log!("publish"; "published [{}]", key);
    println!("{key}");
    Ok(())
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read event from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("failed to read event from {}", input.display()))
}

/// Parse and validate a payload, then give it a fresh key. Any `key` in the
/// input is ignored.
fn prepare(raw: &str) -> Result<Envelope> {
    let given = Envelope::from_json(raw)?;
    let envelope = Envelope::new(given.kind, given.action, given.data);
    Event::from_envelope(&envelope).context("event payload rejected")?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Action, EventKey, EventType};

    #[test]
    fn test_prepare_assigns_fresh_key() {
        let raw = r#"{"type": "post", "action": "delete", "key": "mine",
                      "data": {"url": "https://bear.im/bearlog/2024/070/a.html"}}"#;
        let envelope = prepare(raw).unwrap();
        assert_eq!(envelope.kind, EventType::Post);
        assert_eq!(envelope.action, Some(Action::Delete));
        assert!(EventKey::parse(&envelope.key).is_some());
        assert!(envelope.key.starts_with("kaku-event::post::delete::"));
    }

    #[test]
    fn test_prepare_rejects_invalid_payloads() {
        assert!(prepare("not json").is_err());
        assert!(prepare(r#"{"type": "post", "action": "delete", "data": {}}"#).is_err());
        assert!(prepare(r#"{"type": "gather"}"#).is_ok());
    }
}
