//! Run log for the horizon binary.
//!
//! Each invocation appends a short operational trace to
//! `~/.horizon/horizon.log`: what was loaded, how the run was shaped,
//! where reports landed, and any error that aborted it. The file is
//! truncated at init so it always describes the most recent run.
//!
//! There are only two verbosities. The default records INFO and ERROR
//! lines; debug mode (the `--debug` flag or `HORIZON_DEBUG=1`) adds
//! DEBUG lines with per-stage detail.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static DEBUG: AtomicBool = AtomicBool::new(false);

/// Initialize logging for this process.
///
/// `debug` usually comes from the `--debug` CLI flag; the
/// `HORIZON_DEBUG` environment variable enables it as well. Before
/// init, all log calls are no-ops.
pub fn init(debug: bool) {
    let env_debug = std::env::var("HORIZON_DEBUG")
        .map(|v| parse_debug(&v))
        .unwrap_or(false);
    DEBUG.store(debug || env_debug, Ordering::SeqCst);

    if let Some(dir) = dirs::home_dir().map(|h| h.join(".horizon")) {
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("horizon.log");
        // Truncate so the file holds a single run's trace.
        let _ = std::fs::write(&path, "");
        LOG_PATH.set(path).ok();
    }
}

fn parse_debug(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn append(tag: &str, msg: &str) {
    let Some(path) = LOG_PATH.get() else { return };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(file, "[{}] [{}] {}", timestamp, tag, msg);
    }
}

/// Record an INFO line.
pub fn info(msg: &str) {
    append("INFO", msg);
}

/// Record an ERROR line.
pub fn error(msg: &str) {
    append("ERROR", msg);
}

/// Record a DEBUG line; dropped unless debug mode is on.
pub fn debug(msg: &str) {
    if DEBUG.load(Ordering::Relaxed) {
        append("DEBUG", msg);
    }
}

/// Log macro for INFO lines.
#[macro_export]
macro_rules! hlog {
    ($($arg:tt)*) => {
        $crate::log::info(&format!($($arg)*))
    };
}

/// Log macro for ERROR lines.
#[macro_export]
macro_rules! hlog_error {
    ($($arg:tt)*) => {
        $crate::log::error(&format!($($arg)*))
    };
}

/// Log macro for DEBUG lines (only written in debug mode).
#[macro_export]
macro_rules! hlog_debug {
    ($($arg:tt)*) => {
        $crate::log::debug(&format!($($arg)*))
    };
}
