//! The long-lived consumer loop, and replay of unhandled events.

use std::time::Duration;

use super::{Dispatcher, EventOutcome};
use crate::bus::{Publisher, Subscription};
use crate::error::Result;
use crate::event::EVENT_PREFIX;
use crate::ledger::Ledger;
use crate::log;

/// Outcome counts of one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub handled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub ignored: usize,
    /// Receive or ack calls the bus refused.
    pub bus_errors: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Handled => self.handled += 1,
            EventOutcome::Skipped(_) => self.skipped += 1,
            EventOutcome::Failed(_) => self.failed += 1,
            EventOutcome::Ignored => self.ignored += 1,
        }
    }

    pub const fn total(&self) -> usize {
        self.handled + self.skipped + self.failed + self.ignored
    }
}

/// Sequential consumer: one delivery at a time, in bus order.
pub struct Worker<'a> {
    dispatcher: &'a Dispatcher,
    poll: Duration,
}

impl<'a> Worker<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self {
            dispatcher,
            poll: dispatcher.config().events.poll_interval(),
        }
    }

    /// Consume until `stop` returns true. The event in hand always finishes.
    pub fn run(
        &self,
        subscription: &mut dyn Subscription,
        stop: impl Fn() -> bool,
    ) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        log!("worker"; "listening on [{}]", self.dispatcher.config().events.channel);
        while !stop() {
            self.step(subscription, &mut stats);
        }
        log!(
            "worker";
            "stopped: {} handled, {} skipped, {} failed, {} bus errors",
            stats.handled,
            stats.skipped,
            stats.failed,
            stats.bus_errors
        );
        Ok(stats)
    }

    /// Consume until the bus stays quiet for one poll interval.
    pub fn drain(&self, subscription: &mut dyn Subscription) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        while self.step(subscription, &mut stats) {}
        Ok(stats)
    }

    /// Handle at most one delivery. Returns whether one arrived.
    ///
    /// Bus errors are logged and counted, never raised: the listener
    /// outlives a bad message or a flaky spool.
    fn step(&self, subscription: &mut dyn Subscription, stats: &mut WorkerStats) -> bool {
        let delivery = match subscription.next(self.poll) {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return false,
            Err(e) => {
                log!("worker"; "receive failed: {}", e);
                stats.bus_errors += 1;
                // a bus that fails fast must not spin the loop
                std::thread::sleep(self.poll);
                return false;
            }
        };
        let outcome = self.dispatcher.handle_key(&delivery.message);
        stats.record(&outcome);
        // the ledger, not the bus, keeps failed events around
        if let Err(e) = subscription.ack(&delivery) {
            log!("worker"; "ack failed for [{}]: {}", delivery.message, e);
            stats.bus_errors += 1;
        }
        true
    }
}

/// Re-announce every stored event that was never retired: still pending,
/// interrupted, or failed. Returns the keys announced.
pub fn replay(ledger: &dyn Ledger, publisher: &Publisher) -> Result<Vec<String>> {
    let mut announced = Vec::new();
    for key in ledger.keys(EVENT_PREFIX)? {
        if ledger.ttl(&key)?.is_some() {
            continue;
        }
        publisher.announce(&key)?;
        log!("replay"; "republished [{}]", key);
        announced.push(key);
    }
    Ok(announced)
}
