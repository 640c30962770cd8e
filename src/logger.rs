//! Logging utilities with colored output and an optional log file.
//!
//! This module provides:
//! - `log!` macro for timestamped terminal output with colored prefixes
//! - `debug!` macro, only printed with `--verbose`
//! - `init_log_file` to mirror every line (uncolored) into a file
//!
//! # Example
//!
//! ```ignore
//! log!("dispatch"; "handling event [{}]", key);
//! debug!("outbound"; "already processed [{}]", key);
//! ```

use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    fs::{File, OpenOptions},
    io::{Write, stdout},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Log file sink (set from `paths.log_file`)
static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Open (append) the log file every subsequent line is copied to.
pub fn init_log_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    *LOG_FILE.lock() = Some(file);
    Ok(())
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let timestamp = now();
    let prefix = colorize_prefix(module, &module_lower);

    {
        let mut stdout = stdout().lock();
        writeln!(stdout, "{} {prefix} {message}", timestamp.dimmed()).ok();
        stdout.flush().ok();
    }

    if let Some(file) = LOG_FILE.lock().as_mut() {
        writeln!(file, "{} {} {message}", timestamp, plain_line(module)).ok();
    }
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "listen" | "worker" => prefix.bright_blue().bold().to_string(),
        "gather" => prefix.bright_green().bold().to_string(),
        "error" | "failed" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

fn plain_line(module: &str) -> String {
    format!("{:<10}", format!("[{module}]"))
}

/// Current local time formatted as `YYYY-MM-DD HH:MM:SS`
fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ============================================================================
// tests
// ============================================================================
