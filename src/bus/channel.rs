//! In-process bus over crossbeam channels.
//!
//! Subscribers of one channel share a receiver, so each message reaches
//! exactly one of them. Nothing survives the process.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use dashmap::DashMap;
use std::time::Duration;

use super::{Delivery, EventBus, Subscription};
use crate::error::Result;

#[derive(Default)]
pub struct ChannelBus {
    channels: DashMap<String, (Sender<String>, Receiver<String>)>,
}

impl ChannelBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn endpoints(&self, channel: &str) -> (Sender<String>, Receiver<String>) {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(unbounded)
            .value()
            .clone()
    }

    /// Messages queued on `channel` and not yet received.
    pub fn pending(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |c| c.1.len())
    }
}

impl EventBus for ChannelBus {
    fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let (tx, _) = self.endpoints(channel);
        // the bus owns a receiver, so the channel never disconnects
        let _ = tx.send(message.to_string());
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        let (_, rx) = self.endpoints(channel);
        Ok(Box::new(ChannelSubscription { rx }))
    }
}

struct ChannelSubscription {
    rx: Receiver<String>,
}

impl Subscription for ChannelSubscription {
    fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(Delivery::new(message, None))),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn ack(&mut self, _delivery: &Delivery) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_then_receive_in_order() {
        let bus = ChannelBus::new();
        let mut sub = bus.subscribe("kaku-events").unwrap();
        bus.publish("kaku-events", "a").unwrap();
        bus.publish("kaku-events", "b").unwrap();
        bus.publish("other", "c").unwrap();

        let timeout = Duration::from_millis(10);
        assert_eq!(sub.next(timeout).unwrap().unwrap().message, "a");
        assert_eq!(sub.next(timeout).unwrap().unwrap().message, "b");
        assert!(sub.next(timeout).unwrap().is_none());
        assert_eq!(bus.pending("other"), 1);
    }

    #[test]
    fn test_messages_before_subscribe_are_kept() {
        let bus = ChannelBus::new();
        bus.publish("kaku-events", "early").unwrap();
        let mut sub = bus.subscribe("kaku-events").unwrap();
        let delivery = sub.next(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(delivery.message, "early");
        sub.ack(&delivery).unwrap();
    }
}
