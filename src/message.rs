//! # Message protocol between actors.
//!
//! Every mailbox in the runtime carries exactly one of the enums below, so each
//! receive site matches exhaustively over the messages it can actually get:
//!
//! ```text
//! Worker/Supervisor/Listener ── LogMessage::{Log, Terminate} ──► Logger
//! Asker                      ── WorkerMessage::{Question, Terminate} ──► answer worker
//! answer worker              ── Answer ──► Asker
//! Supervisor (dispatch)      ── Dispatch::{Unit, Terminate} ──► connection worker
//! ```
//!
//! Messages are moved into the channel and never touched by the sender again.

use std::fmt;

use crate::connection::Connection;
use crate::error::HandlerError;

/// Severity of a [`Log`] record.
///
/// Ordered from least to most severe, so `level >= LogLevel::Warn` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Lowercase name, as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observability record sent to the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub level: LogLevel,
    pub content: String,
}

impl Log {
    pub fn new(level: LogLevel, content: impl Into<String>) -> Self {
        Self {
            level,
            content: content.into(),
        }
    }
}

/// Messages accepted by the logger's mailbox.
#[derive(Debug)]
pub enum LogMessage {
    /// Write one line.
    Log(Log),
    /// Leave the logging loop.
    Terminate,
}

/// Messages accepted by an answer worker's mailbox.
#[derive(Debug)]
pub enum WorkerMessage<Q> {
    /// A question to answer; exactly one [`Answer`] is produced for it.
    Question(Q),
    /// Leave the answer loop.
    Terminate,
}

/// The reply to one question.
#[derive(Debug)]
pub struct Answer<A> {
    pub content: Result<A, HandlerError>,
}

/// What the supervisor hands a connection worker when it asks for work.
///
/// `Terminate` is the in-band sentinel; a closed channel (no `Dispatch` at all)
/// means the supervisor itself is gone.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Unit(Connection),
    Terminate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Fatal.to_string(), "fatal");
    }
}
