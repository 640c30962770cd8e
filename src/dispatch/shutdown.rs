//! Ctrl+C handling for the long-running worker.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::log;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl+C handler. The worker finishes the event in hand, then
/// leaves its loop.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            // second Ctrl+C: stop waiting for the current event
            std::process::exit(130);
        }
        log!("worker"; "shutting down after the current event...");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

