//! Event bus: producers publish event keys, the worker consumes them.
//!
//! Deliveries are at-least-once: a message stays queued until the consumer
//! acknowledges it, so a crash mid-event replays that key on restart. Handlers
//! are written to tolerate the replay.
//!
//! - [`SpoolBus`]: one spool directory per channel, shared across processes
//! - [`ChannelBus`]: in-process crossbeam channels
//! - [`Publisher`]: ledger-then-bus producer helper

mod channel;
mod publisher;
mod spool;

pub use channel::ChannelBus;
pub use publisher::Publisher;
pub use spool::SpoolBus;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// One received message, handed back to [`Subscription::ack`] once handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message: String,
    /// Spool file backing this delivery, if any.
    pub(crate) receipt: Option<PathBuf>,
}

impl Delivery {
    pub(crate) fn new(message: String, receipt: Option<PathBuf>) -> Self {
        Self { message, receipt }
    }
}

pub trait EventBus: Send + Sync {
    fn publish(&self, channel: &str, message: &str) -> Result<()>;

    fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>>;
}

pub trait Subscription: Send {
    /// Wait up to `timeout` for the next message.
    fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>>;

    /// Mark a delivery handled so it is never redelivered.
    fn ack(&mut self, delivery: &Delivery) -> Result<()>;
}
