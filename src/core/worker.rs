//! # Standard connection worker.
//!
//! A worker repeatedly takes one unit from its [`UnitSource`], runs the handler on
//! it and releases it. It never interrupts a running handler: on shutdown it
//! finishes the current unit, then exits on `Terminate`.
//!
//! ```text
//! loop {
//!   next() ── Unit(conn) ──► run_once ──► report ──► close ──► complete ──► notify
//!        ├─── Terminate ───► exit
//!        └─── Closed ──────► warn, exit (no retry)
//! }
//! ```
//!
//! ## Rules
//! - Exactly one unit in flight per worker.
//! - Every unit is released exactly once, whatever the handler did.
//! - A handler fault produces exactly one log line and the worker keeps going.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::HandlerError;
use crate::handlers::HandlerRef;
use crate::logger::LoggerHandle;

use super::progress::Progress;
use super::runner::run_once;
use super::source::{CompletionSignal, Next, UnitSource, WorkerId};

/// Why a worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Received `Terminate` (or, for interruptable workers, the shutdown signal).
    Terminated,
    /// The supervisor side disappeared.
    SourceClosed,
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkerExit::Terminated => "terminated",
            WorkerExit::SourceClosed => "supervisor link closed",
        })
    }
}

/// Everything a worker needs besides its unit source.
pub(crate) struct WorkerContext {
    pub(crate) id: WorkerId,
    pub(crate) name: Arc<str>,
    pub(crate) handler: HandlerRef,
    pub(crate) logger: LoggerHandle,
    pub(crate) progress: Arc<Progress>,
    pub(crate) token: CancellationToken,
    pub(crate) completion: CompletionSignal,
}

impl WorkerContext {
    /// Logs the outcome of one invocation.
    pub(crate) async fn report(&self, conn: &Connection, res: &Result<(), HandlerError>) {
        match res {
            Ok(()) => {
                self.logger
                    .debug(format!("{}: served {conn}", self.name))
                    .await;
            }
            Err(HandlerError::Canceled) => {
                self.logger
                    .warn(format!("{}: cancelled in-flight {conn}", self.name))
                    .await;
            }
            Err(err) => {
                self.logger
                    .error(format!(
                        "{}: {} failed on {conn}: {err}",
                        self.name,
                        self.handler.name()
                    ))
                    .await;
            }
        }
    }

    /// Reports, releases and counts one finished unit.
    pub(crate) async fn finish(&self, conn: Connection, res: Result<(), HandlerError>) {
        self.report(&conn, &res).await;
        conn.close().await;
        self.progress.complete();
        self.completion.notify();
    }

    /// Closes units that were handed over but never started.
    pub(crate) async fn discard(&self, units: Vec<Connection>, why: &str) {
        for conn in units {
            self.logger
                .warn(format!("{}: closing unserved {conn} ({why})", self.name))
                .await;
            conn.close().await;
        }
    }
}

pub(crate) struct Worker {
    ctx: WorkerContext,
    source: UnitSource,
}

impl Worker {
    pub(crate) fn new(ctx: WorkerContext, source: UnitSource) -> Self {
        Self { ctx, source }
    }

    pub(crate) async fn run(mut self) -> WorkerExit {
        self.ctx
            .logger
            .info(format!("{} started", self.ctx.name))
            .await;

        let exit = loop {
            match self.source.next().await {
                Next::Unit(mut conn) => {
                    let res = run_once(
                        self.ctx.handler.as_ref(),
                        &mut conn,
                        self.ctx.token.clone(),
                    )
                    .await;
                    self.ctx.finish(conn, res).await;
                }
                Next::Terminate => break WorkerExit::Terminated,
                Next::Closed => {
                    self.ctx
                        .logger
                        .warn(format!("{}: supervisor link closed; exiting", self.ctx.name))
                        .await;
                    break WorkerExit::SourceClosed;
                }
            }
        };

        let leftovers = self.source.abandon();
        self.ctx.discard(leftovers, "worker exiting").await;
        self.ctx.progress.close();
        self.ctx
            .logger
            .debug(format!("{} exited: {exit}", self.ctx.name))
            .await;
        tracing::debug!(worker = self.ctx.id, %exit, "worker exited");
        exit
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use futures::FutureExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::mpsc;

    use super::*;
    use crate::connection::tests::connected_pair;
    use crate::handlers::HandlerFn;
    use crate::logger::{Logger, MemorySink};
    use crate::message::{Dispatch, LogLevel};

    pub(crate) fn context(
        id: WorkerId,
        handler: HandlerRef,
        logger: LoggerHandle,
        completion: CompletionSignal,
    ) -> WorkerContext {
        WorkerContext {
            id,
            name: format!("worker-{id}").into(),
            handler,
            logger,
            progress: Arc::new(Progress::new()),
            token: CancellationToken::new(),
            completion,
        }
    }

    #[tokio::test]
    async fn serves_units_until_terminate() {
        let sink = MemorySink::new();
        let (log, _log_join) = Logger::spawn(Box::new(sink.clone()), 64, LogLevel::Debug);
        let handler: HandlerRef = HandlerFn::arc("echo-id", |conn, _ctx| {
            async move {
                let line = format!("unit {}\n", conn.id());
                conn.stream_mut().write_all(line.as_bytes()).await?;
                Ok::<_, HandlerError>(())
            }
            .boxed()
        });
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let ctx = context(0, handler, log, CompletionSignal::new(0, Some(done_tx)));
        let progress = Arc::clone(&ctx.progress);

        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(Worker::new(ctx, UnitSource::push(rx)).run());

        let (conn, mut client) = connected_pair(7).await;
        tx.send(Dispatch::Unit(conn)).await.unwrap();
        let mut buf = String::new();
        client.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "unit 7\n");
        assert_eq!(done_rx.recv().await, Some(0));

        tx.send(Dispatch::Terminate).await.unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, WorkerExit::Terminated);
        assert_eq!(progress.current(), 1);
        assert!(progress.is_closed());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.count_matching("worker-0 started"), 1);
    }

    #[tokio::test]
    async fn handler_fault_is_logged_once_and_worker_continues() {
        let sink = MemorySink::new();
        let (log, _log_join) = Logger::spawn(Box::new(sink.clone()), 64, LogLevel::Info);
        let handler: HandlerRef = HandlerFn::arc("picky", |conn, _ctx| {
            async move {
                if conn.id() == 1 {
                    return Err(HandlerError::fail("bad unit"));
                }
                Ok::<_, HandlerError>(())
            }
            .boxed()
        });
        let ctx = context(0, handler, log, CompletionSignal::new(0, None));
        let progress = Arc::clone(&ctx.progress);
        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(Worker::new(ctx, UnitSource::push(rx)).run());

        let (c1, mut k1) = connected_pair(1).await;
        let (c2, mut k2) = connected_pair(2).await;
        tx.send(Dispatch::Unit(c1)).await.unwrap();
        tx.send(Dispatch::Unit(c2)).await.unwrap();
        let mut sink_buf = Vec::new();
        k1.read_to_end(&mut sink_buf).await.unwrap();
        k2.read_to_end(&mut sink_buf).await.unwrap();
        drop(tx);

        let exit = tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, WorkerExit::SourceClosed);
        assert_eq!(progress.current(), 2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.count_matching("failed on connection #1"), 1);
        assert_eq!(sink.count_matching("supervisor link closed"), 1);
    }
}
