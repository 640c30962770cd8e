//! Producer side: store the payload, then announce its key.

use std::sync::Arc;

use super::EventBus;
use crate::debug;
use crate::error::{Error, Result};
use crate::event::{Envelope, EventKey};
use crate::ledger::Ledger;

/// Publishes events the way every producer must: payload into the ledger
/// under the event key first, key onto the bus second.
#[derive(Clone)]
pub struct Publisher {
    ledger: Arc<dyn Ledger>,
    bus: Arc<dyn EventBus>,
    channel: String,
}

impl Publisher {
    pub fn new(ledger: Arc<dyn Ledger>, bus: Arc<dyn EventBus>, channel: impl Into<String>) -> Self {
        Self {
            ledger,
            bus,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn publish(&self, envelope: &Envelope) -> Result<EventKey> {
        let key = EventKey::parse(&envelope.key)
            .ok_or_else(|| Error::validation(format!("bad event key `{}`", envelope.key)))?;
        self.ledger.set(key.as_str(), &envelope.to_json())?;
        self.announce(key.as_str())?;
        Ok(key)
    }

    /// Put an already stored key back on the bus.
    pub fn announce(&self, key: &str) -> Result<()> {
        debug!("publish"; "{} -> {}", key, self.channel);
        self.bus.publish(&self.channel, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChannelBus;
    use crate::event::{Action, EventType};
    use crate::ledger::MemoryLedger;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_payload_stored_before_announce() {
        let ledger = Arc::new(MemoryLedger::new());
        let bus = Arc::new(ChannelBus::new());
        let mut sub = bus.subscribe("kaku-events").unwrap();
        let publisher = Publisher::new(ledger.clone(), bus.clone(), "kaku-events");

        let env = Envelope::new(EventType::Post, Some(Action::Delete), json!({"url": "/a.html"}));
        let key = publisher.publish(&env).unwrap();

        let delivery = sub.next(Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!(delivery.message, key.as_str());
        let stored = ledger.get(key.as_str()).unwrap().unwrap();
        assert_eq!(Envelope::from_json(&stored).unwrap(), env);
    }
}
