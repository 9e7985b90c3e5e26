use tokio::sync::mpsc;

use crate::message::{Log, LogLevel, LogMessage};

/// Send-only reference to the logger, shared by the supervisor and every worker.
///
/// Cheap to clone. Owns nothing sent through it.
#[derive(Clone, Debug)]
pub struct LoggerHandle {
    tx: mpsc::Sender<LogMessage>,
}

impl LoggerHandle {
    pub(crate) fn new(tx: mpsc::Sender<LogMessage>) -> Self {
        Self { tx }
    }

    /// Queues one line, waiting only while the mailbox is full.
    ///
    /// If the logger has terminated the line is dropped.
    pub async fn log(&self, level: LogLevel, content: impl Into<String>) {
        let msg = LogMessage::Log(Log::new(level, content));
        if self.tx.send(msg).await.is_err() {
            tracing::trace!(%level, "logger terminated; line dropped");
        }
    }

    /// Queues one line without waiting. Returns `false` if it was dropped.
    pub fn try_log(&self, level: LogLevel, content: impl Into<String>) -> bool {
        match self.tx.try_send(LogMessage::Log(Log::new(level, content))) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(%level, "logger mailbox full; line dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    #[inline]
    pub async fn debug(&self, content: impl Into<String>) {
        self.log(LogLevel::Debug, content).await;
    }

    #[inline]
    pub async fn info(&self, content: impl Into<String>) {
        self.log(LogLevel::Info, content).await;
    }

    #[inline]
    pub async fn warn(&self, content: impl Into<String>) {
        self.log(LogLevel::Warn, content).await;
    }

    #[inline]
    pub async fn error(&self, content: impl Into<String>) {
        self.log(LogLevel::Error, content).await;
    }

    #[inline]
    pub async fn fatal(&self, content: impl Into<String>) {
        self.log(LogLevel::Fatal, content).await;
    }

    /// Asks the logger to leave its loop after the lines already queued.
    pub async fn terminate(&self) {
        let _ = self.tx.send(LogMessage::Terminate).await;
    }

    /// True once the logger task has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
