//! Crate-level error types.

use std::fmt;

/// Errors produced during client startup and operation.
#[derive(Debug)]
pub enum Error {
    /// GPU device or surface initialization failure.
    Gpu(String),
    /// Video engine (libmpv) initialization or command failure.
    Player(String),
    /// Web engine host initialization failure.
    WebEngine(String),
    /// Event loop creation or dispatch failure.
    EventLoop(String),
    /// Generic I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(msg) => write!(f, "GPU error: {msg}"),
            Self::Player(msg) => write!(f, "video engine error: {msg}"),
            Self::WebEngine(msg) => write!(f, "web engine error: {msg}"),
            Self::EventLoop(msg) => write!(f, "event loop error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
