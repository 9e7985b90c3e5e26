//! # Worker registry.
//!
//! Spawns the worker pool for one `Running` phase and owns the worker handles.
//!
//! ```text
//! Registry::spawn(cfg)
//!   ├─ Pull:       one shared pull channel ──► Lanes::Pull
//!   └─ PushSelect: one mailbox per worker + completion channel ──► Lanes::Push
//! ```
//!
//! ## Rules
//! - The registry never keeps a sender of the worker channels: once every worker
//!   has exited, the dispatcher observes the channels as closed.
//! - Workers are joined in id order, one at a time.
//! - Every join is counted in the shared join-attempt counter.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DispatchMode, WorkerKind};
use crate::handlers::HandlerRef;
use crate::logger::LoggerHandle;

use super::dispatch::Lanes;
use super::interruptable::InterruptableWorker;
use super::progress::Progress;
use super::source::{CompletionSignal, UnitSource, WorkerId};
use super::worker::{Worker, WorkerContext, WorkerExit};

/// Mailbox depth of a push-mode worker: one unit plus a `Terminate`.
const PUSH_MAILBOX: usize = 2;

/// Handle to a running worker.
struct Handle {
    name: Arc<str>,
    join: JoinHandle<WorkerExit>,
    progress: Arc<Progress>,
}

/// Worker pool of one running phase.
pub(crate) struct Registry {
    workers: BTreeMap<WorkerId, Handle>,
    /// Counters outlive the join, so the final tallies stay readable.
    counters: Vec<(Arc<str>, Arc<Progress>)>,
}

impl Registry {
    /// Spawns `cfg.pool_size` workers and returns the dispatcher's side of their channels.
    pub(crate) fn spawn(
        cfg: &Config,
        handler: &HandlerRef,
        logger: &LoggerHandle,
        runtime_token: &CancellationToken,
    ) -> (Self, Lanes) {
        let mut workers = BTreeMap::new();

        let lanes = match cfg.dispatch {
            DispatchMode::Pull => {
                let (pull_tx, pulls) = mpsc::channel(cfg.pool_size);
                for id in 0..cfg.pool_size {
                    let source = UnitSource::pull(id, pull_tx.clone());
                    let ctx = context(id, handler, logger, runtime_token, None);
                    workers.insert(id, launch(cfg.worker, ctx, source));
                }
                Lanes::Pull { pulls }
            }
            DispatchMode::PushSelect => {
                let (done_tx, done) = mpsc::unbounded_channel();
                let mut mailboxes = BTreeMap::new();
                for id in 0..cfg.pool_size {
                    let (mailbox, rx) = mpsc::channel(PUSH_MAILBOX);
                    mailboxes.insert(id, mailbox);
                    let ctx = context(id, handler, logger, runtime_token, Some(done_tx.clone()));
                    workers.insert(id, launch(cfg.worker, ctx, UnitSource::push(rx)));
                }
                Lanes::Push { mailboxes, done }
            }
        };

        let counters = workers
            .values()
            .map(|h: &Handle| (Arc::clone(&h.name), Arc::clone(&h.progress)))
            .collect();
        (Self { workers, counters }, lanes)
    }

    /// `(name, completed units)` of every worker, in id order.
    pub(crate) fn completions(&self) -> Vec<(String, u64)> {
        self.counters
            .iter()
            .map(|(name, progress)| (name.to_string(), progress.current()))
            .collect()
    }

    /// Joins every worker in id order, logging how each one ended.
    pub(crate) async fn join_all(&mut self, logger: &LoggerHandle, attempts: &AtomicU64) {
        for (_, handle) in std::mem::take(&mut self.workers) {
            attempts.fetch_add(1, Ordering::Relaxed);
            match handle.join.await {
                Ok(exit) => {
                    logger
                        .debug(format!(
                            "{} joined ({exit}, {} units)",
                            handle.name,
                            handle.progress.current()
                        ))
                        .await;
                }
                Err(err) => {
                    logger
                        .error(format!("{} task failed: {err}", handle.name))
                        .await;
                }
            }
        }
    }
}

fn context(
    id: WorkerId,
    handler: &HandlerRef,
    logger: &LoggerHandle,
    runtime_token: &CancellationToken,
    done: Option<mpsc::UnboundedSender<WorkerId>>,
) -> WorkerContext {
    WorkerContext {
        id,
        name: format!("worker-{id}").into(),
        handler: Arc::clone(handler),
        logger: logger.clone(),
        progress: Arc::new(Progress::new()),
        token: runtime_token.child_token(),
        completion: CompletionSignal::new(id, done),
    }
}

fn launch(kind: WorkerKind, ctx: WorkerContext, source: UnitSource) -> Handle {
    let name = Arc::clone(&ctx.name);
    let progress = Arc::clone(&ctx.progress);
    let join = match kind {
        WorkerKind::Standard => tokio::spawn(Worker::new(ctx, source).run()),
        WorkerKind::Interruptable => tokio::spawn(InterruptableWorker::new(ctx, source).run()),
    };
    Handle {
        name,
        join,
        progress,
    }
}
