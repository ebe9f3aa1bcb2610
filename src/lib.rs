//! Native Jellyfin desktop client library.
//!
//! Hosts two off-screen web-engine views (main UI + onboarding overlay) and
//! an out-of-process video engine, and composites their output into a single
//! window with correct Z-order, fade transitions, and input routing.

pub mod app;
pub mod cursor;
pub mod error;
pub mod gpu;
pub mod input;
pub mod menu;
pub mod overlay;
pub mod player;
pub mod settings;
pub mod webengine;

use std::io::Write;

/// Returns the path to the debug log file.
pub fn log_path() -> std::path::PathBuf {
    std::env::current_exe()
        .unwrap_or_default()
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join("jellyfin_desktop.log")
}

/// Persistent buffered log file handle — opened once, reused for all writes.
static LOG_FILE: std::sync::OnceLock<std::sync::Mutex<std::io::BufWriter<std::fs::File>>> =
    std::sync::OnceLock::new();

fn log_writer() -> &'static std::sync::Mutex<std::io::BufWriter<std::fs::File>> {
    LOG_FILE.get_or_init(|| {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path())
            .expect("failed to open log file");
        std::sync::Mutex::new(std::io::BufWriter::new(file))
    })
}

/// Writes a log message to the debug log file.
pub fn log(msg: &str) {
    if let Ok(mut w) = log_writer().lock() {
        let _ = w.write_all(msg.as_bytes());
        let _ = w.write_all(b"\n");
        let _ = w.flush();
    }
}
