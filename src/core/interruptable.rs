//! # Interruptable connection worker.
//!
//! Splits a worker into two flows so that the unit in flight can be cancelled:
//!
//! ```text
//!            ┌──────────── outer flow ────────────┐
//! source ──► │ wait ready ─► next() ─► local queue│──┐
//!            └────────────────────────────────────┘  │
//!                         ▲ ready                     ▼
//!            ┌──────────── inner flow ────────────┐
//!            │ queue.recv ─► select(cancel, run)  │
//!            └────────────────────────────────────┘
//! ```
//!
//! The outer flow only pulls a new unit after the inner flow reported ready, so at
//! most one unit is queued or running at a time.
//!
//! ## Rules
//! - Shutdown (worker token cancelled, `Terminate`, or a closed source) cancels the
//!   inner flow's token; a running handler is dropped at its next await point.
//! - A cancelled unit is logged as a cancellation, then released like any other.
//! - The inner flow is always joined before the worker reports its exit.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::HandlerError;

use super::runner::run_once;
use super::source::{Next, UnitSource};
use super::worker::{WorkerContext, WorkerExit};

pub(crate) struct InterruptableWorker {
    ctx: Arc<WorkerContext>,
    source: UnitSource,
}

impl InterruptableWorker {
    pub(crate) fn new(ctx: WorkerContext, source: UnitSource) -> Self {
        Self {
            ctx: Arc::new(ctx),
            source,
        }
    }

    pub(crate) async fn run(mut self) -> WorkerExit {
        let ctx = Arc::clone(&self.ctx);
        ctx.logger.info(format!("{} started", ctx.name)).await;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Connection>();
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);
        let inner_token = CancellationToken::new();
        let inner = tokio::spawn(inner_flow(
            Arc::clone(&ctx),
            queue_rx,
            ready_tx,
            inner_token.clone(),
        ));

        let exit = loop {
            let ready = tokio::select! {
                biased;
                _ = ctx.token.cancelled() => break WorkerExit::Terminated,
                r = ready_rx.recv() => r,
            };
            if ready.is_none() {
                ctx.logger
                    .error(format!("{}: inner flow vanished", ctx.name))
                    .await;
                break WorkerExit::Terminated;
            }

            let next = tokio::select! {
                biased;
                _ = ctx.token.cancelled() => break WorkerExit::Terminated,
                n = self.source.next() => n,
            };
            match next {
                Next::Unit(conn) => {
                    if let Err(mpsc::error::SendError(conn)) = queue_tx.send(conn) {
                        ctx.discard(vec![conn], "inner flow gone").await;
                        break WorkerExit::Terminated;
                    }
                }
                Next::Terminate => break WorkerExit::Terminated,
                Next::Closed => {
                    ctx.logger
                        .warn(format!("{}: supervisor link closed; exiting", ctx.name))
                        .await;
                    break WorkerExit::SourceClosed;
                }
            }
        };

        inner_token.cancel();
        drop(queue_tx);
        let leftovers = self.source.abandon();
        ctx.discard(leftovers, "worker exiting").await;
        if let Err(err) = inner.await {
            ctx.logger
                .error(format!("{}: inner flow failed: {err}", ctx.name))
                .await;
        }

        ctx.progress.close();
        ctx.logger
            .debug(format!("{} exited: {exit}", ctx.name))
            .await;
        tracing::debug!(worker = ctx.id, %exit, "interruptable worker exited");
        exit
    }
}

async fn inner_flow(
    ctx: Arc<WorkerContext>,
    mut queue: mpsc::UnboundedReceiver<Connection>,
    ready: mpsc::Sender<()>,
    token: CancellationToken,
) {
    loop {
        if ready.send(()).await.is_err() {
            break;
        }
        let mut conn = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            c = queue.recv() => match c {
                Some(conn) => conn,
                None => break,
            },
        };

        let res = tokio::select! {
            biased;
            _ = token.cancelled() => Err(HandlerError::Canceled),
            r = run_once(ctx.handler.as_ref(), &mut conn, token.child_token()) => r,
        };
        ctx.finish(conn, res).await;
    }

    queue.close();
    let mut leftovers = Vec::new();
    while let Ok(conn) = queue.try_recv() {
        leftovers.push(conn);
    }
    ctx.discard(leftovers, "worker exiting").await;
}
