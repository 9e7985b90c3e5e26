use std::io::Write;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::{Log, LogLevel, LogMessage};

use super::LoggerHandle;

/// Output destination of the logger: anything that can write and flush.
pub type Sink = Box<dyn Write + Send>;

/// `Time#ctime`-style timestamp, e.g. `Sun Oct 18 09:04:05 2026`.
const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// The logger actor: drains its mailbox into the sink until told to terminate.
pub struct Logger {
    rx: mpsc::Receiver<LogMessage>,
    sink: Sink,
    min_level: LogLevel,
}

impl Logger {
    /// Spawns a logger task writing to `sink`.
    ///
    /// Records below `min_level` are discarded. The join handle yields the sink
    /// back once the logger has terminated, so the owner can reuse it.
    pub fn spawn(
        sink: Sink,
        capacity: usize,
        min_level: LogLevel,
    ) -> (LoggerHandle, JoinHandle<Sink>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let logger = Self {
            rx,
            sink,
            min_level,
        };
        (LoggerHandle::new(tx), tokio::spawn(logger.run()))
    }

    async fn run(mut self) -> Sink {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                LogMessage::Log(log) => self.write(&log),
                LogMessage::Terminate => break,
            }
        }
        // Anything still queued after Terminate is dropped with the receiver.
        self.rx.close();
        self.sink
    }

    fn write(&mut self, log: &Log) {
        if log.level < self.min_level {
            return;
        }
        let stamp = Local::now().format(CTIME_FORMAT);
        let res = writeln!(self.sink, "[{stamp}] {}", log.content).and_then(|()| self.sink.flush());
        if let Err(err) = res {
            tracing::warn!(error = %err, level = %log.level, "logger sink write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::logger::MemorySink;

    #[tokio::test]
    async fn writes_timestamped_lines_until_terminated() {
        let sink = MemorySink::new();
        let (log, join) = Logger::spawn(Box::new(sink.clone()), 8, LogLevel::Info);

        log.info("first").await;
        log.error("second").await;
        log.terminate().await;
        let _sink = tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("logger did not terminate")
            .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }

    #[tokio::test]
    async fn discards_records_below_min_level() {
        let sink = MemorySink::new();
        let (log, join) = Logger::spawn(Box::new(sink.clone()), 8, LogLevel::Warn);

        log.debug("noise").await;
        log.info("chatter").await;
        log.warn("kept").await;
        log.terminate().await;
        join.await.unwrap();

        assert_eq!(sink.lines().len(), 1);
        assert_eq!(sink.count_matching("kept"), 1);
    }

    #[tokio::test]
    async fn sends_after_termination_are_dropped_without_waiting() {
        let sink = MemorySink::new();
        let (log, join) = Logger::spawn(Box::new(sink.clone()), 1, LogLevel::Debug);

        log.terminate().await;
        join.await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), log.fatal("late"))
            .await
            .expect("send to a terminated logger must not block");
        assert!(!log.try_log(LogLevel::Info, "later"));
        assert!(log.is_closed());
        assert_eq!(sink.count_matching("late"), 0);
    }

    #[tokio::test]
    async fn exits_when_every_handle_is_dropped() {
        let (log, join) = Logger::spawn(Box::new(MemorySink::new()), 4, LogLevel::Info);
        drop(log);
        tokio::time::timeout(Duration::from_secs(5), join)
            .await
            .expect("logger outlived its handles")
            .unwrap();
    }
}
