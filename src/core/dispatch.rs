//! # Dispatch loop: moves accepted connections to workers.
//!
//! Runs as its own task for the whole `Running` phase and ends in one of two ways:
//!
//! ```text
//!                 ┌── token cancelled ──► drain ──► Drained   (graceful: stop() joins everything)
//! steady loop ────┤
//!                 └── fault / panic ────► crash ──► Crashed   (nothing is joined)
//! ```
//!
//! ## Pull
//! Waits for a [`PullRequest`], then takes the next connection from the listener and
//! replies with it. The listener only accepts while some worker is asking.
//!
//! ## Push+select
//! Keeps a queue of idle workers. While one is idle, accepts and pushes the unit
//! into that worker's mailbox; otherwise waits for a completion signal.
//!
//! ## Rules
//! - A listener fault, a vanished pool, or a panic in this loop is a crash.
//! - A crash is logged exactly once and moves the lifecycle straight to `Crashed`.
//! - Draining answers every worker with `Terminate` and never drops a connection
//!   silently: salvaged units are closed with a warning.

use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::{DispatchFault, panic_message};
use crate::logger::LoggerHandle;
use crate::message::{Dispatch, LogLevel};

use super::lifecycle::{Lifecycle, LifecycleState};
use super::listener::ListenerHandle;
use super::source::{PullRequest, WorkerId};

/// Supervisor-side ends of the worker channels.
pub(crate) enum Lanes {
    Pull {
        pulls: mpsc::Receiver<PullRequest>,
    },
    Push {
        mailboxes: BTreeMap<WorkerId, mpsc::Sender<Dispatch>>,
        done: mpsc::UnboundedReceiver<WorkerId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchExit {
    Drained,
    Crashed(String),
}

/// What the dispatch task hands back to `stop()`.
pub(crate) struct Dispatched {
    pub(crate) exit: DispatchExit,
    /// Present only after a drain; a crashed listener is never joined.
    pub(crate) listener: Option<ListenerHandle>,
}

pub(crate) struct Dispatcher {
    listener: ListenerHandle,
    lanes: Lanes,
    logger: LoggerHandle,
    lifecycle: Arc<Lifecycle>,
    token: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        listener: ListenerHandle,
        lanes: Lanes,
        logger: LoggerHandle,
        lifecycle: Arc<Lifecycle>,
        token: CancellationToken,
    ) -> Self {
        Self {
            listener,
            lanes,
            logger,
            lifecycle,
            token,
        }
    }

    pub(crate) async fn run(self) -> Dispatched {
        let Dispatcher {
            mut listener,
            mut lanes,
            logger,
            lifecycle,
            token,
        } = self;
        let mut parked: Option<PullRequest> = None;

        let steady = match &mut lanes {
            Lanes::Pull { pulls } => {
                AssertUnwindSafe(pull_loop(&mut listener, pulls, &mut parked, &logger, &token))
                    .catch_unwind()
                    .await
            }
            Lanes::Push { mailboxes, done } => {
                AssertUnwindSafe(push_loop(&mut listener, mailboxes, done, &logger, &token))
                    .catch_unwind()
                    .await
            }
        };
        let fault = match steady {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => Some(fault),
            Err(panic) => Some(DispatchFault::Panicked {
                info: panic_message(panic.as_ref()),
            }),
        };

        if let Some(fault) = fault {
            let reason = fault.to_string();
            crash(&lifecycle, &logger, &reason);
            if let Some(conn) = listener.stop() {
                release_at_crash(&logger, conn).await;
            }
            return Dispatched {
                exit: DispatchExit::Crashed(reason),
                listener: None,
            };
        }

        drain(&mut listener, lanes, parked, &logger).await;
        Dispatched {
            exit: DispatchExit::Drained,
            listener: Some(listener),
        }
    }
}

async fn pull_loop(
    listener: &mut ListenerHandle,
    pulls: &mut mpsc::Receiver<PullRequest>,
    parked: &mut Option<PullRequest>,
    logger: &LoggerHandle,
    token: &CancellationToken,
) -> Result<(), DispatchFault> {
    loop {
        let req = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            req = pulls.recv() => req.ok_or(DispatchFault::PoolVanished)?,
        };

        let conn = tokio::select! {
            biased;
            _ = token.cancelled() => {
                *parked = Some(req);
                return Ok(());
            }
            conn = listener.next() => conn?,
        };

        if let Err(Dispatch::Unit(conn)) = req.reply.send(Dispatch::Unit(conn)) {
            release(
                logger,
                conn,
                &format!("worker-{} stopped pulling", req.worker),
            )
            .await;
        }
    }
}

async fn push_loop(
    listener: &mut ListenerHandle,
    mailboxes: &mut BTreeMap<WorkerId, mpsc::Sender<Dispatch>>,
    done: &mut mpsc::UnboundedReceiver<WorkerId>,
    logger: &LoggerHandle,
    token: &CancellationToken,
) -> Result<(), DispatchFault> {
    let mut idle: VecDeque<WorkerId> = mailboxes.keys().copied().collect();
    loop {
        if mailboxes.is_empty() {
            return Err(DispatchFault::PoolVanished);
        }

        let Some(&worker) = idle.front() else {
            // Every worker is busy: wait for any of them to finish.
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                id = done.recv() => idle.push_back(id.ok_or(DispatchFault::PoolVanished)?),
            }
            continue;
        };

        let conn = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            id = done.recv() => {
                idle.push_back(id.ok_or(DispatchFault::PoolVanished)?);
                continue;
            }
            conn = listener.next() => conn?,
        };
        idle.pop_front();

        let Some(mailbox) = mailboxes.get(&worker) else {
            release(logger, conn, &format!("worker-{worker} is unknown")).await;
            continue;
        };
        let sent = mailbox.send(Dispatch::Unit(conn)).await;
        if let Err(mpsc::error::SendError(Dispatch::Unit(conn))) = sent {
            mailboxes.remove(&worker);
            release(logger, conn, &format!("worker-{worker} is gone")).await;
        }
    }
}

/// Stops the listener and tells every worker to terminate.
async fn drain(
    listener: &mut ListenerHandle,
    lanes: Lanes,
    parked: Option<PullRequest>,
    logger: &LoggerHandle,
) {
    if let Some(conn) = listener.stop() {
        release(logger, conn, "shutting down").await;
    }

    match lanes {
        Lanes::Pull { mut pulls } => {
            if let Some(req) = parked {
                let _ = req.reply.send(Dispatch::Terminate);
            }
            // Ends once every worker has dropped its side of the pull channel.
            while let Some(req) = pulls.recv().await {
                let _ = req.reply.send(Dispatch::Terminate);
            }
        }
        Lanes::Push { mailboxes, done } => {
            drop(done);
            for (_, mailbox) in mailboxes {
                let _ = mailbox.send(Dispatch::Terminate).await;
            }
        }
    }
    logger.debug("dispatch drained").await;
}

/// Records the crash: one log line, one state transition.
fn crash(lifecycle: &Lifecycle, logger: &LoggerHandle, reason: &str) {
    match lifecycle.transition(LifecycleState::Running, LifecycleState::Crashed) {
        Ok(()) => {
            tracing::error!(%reason, "supervisor crashed");
            if !logger.try_log(LogLevel::Fatal, format!("supervisor crashed: {reason}")) {
                tracing::error!("crash line could not be queued to the logger");
            }
        }
        Err(state) => {
            tracing::warn!(%state, %reason, "dispatch fault outside the running state");
        }
    }
}

/// Closes a unit stranded by a crash; the line is dropped if the logger is busy.
async fn release_at_crash(logger: &LoggerHandle, conn: Connection) {
    logger.try_log(
        LogLevel::Warn,
        format!("closing undelivered {conn}: supervisor crashed"),
    );
    conn.close().await;
}

async fn release(logger: &LoggerHandle, conn: Connection, why: &str) {
    logger
        .warn(format!("closing undelivered {conn}: {why}"))
        .await;
    conn.close().await;
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::connection::tests::connected_pair;
    use crate::core::listener::tests::ScriptedEndpoint;
    use crate::core::listener::{Endpoint, Listener};
    use crate::logger::{Logger, MemorySink};

    async fn scripted_listener(
        script: Vec<io::ErrorKind>,
        logger: LoggerHandle,
        token: &CancellationToken,
    ) -> ListenerHandle {
        let acceptor = ScriptedEndpoint(script).bind().await.unwrap();
        Listener::spawn(acceptor, logger, token.child_token(), "scripted".into())
    }

    #[tokio::test]
    async fn accept_fault_crashes_once() {
        let sink = MemorySink::new();
        let (log, _log_join) = Logger::spawn(Box::new(sink.clone()), 64, LogLevel::Info);
        let token = CancellationToken::new();
        let listener = scripted_listener(vec![io::ErrorKind::Other], log.clone(), &token).await;
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle
            .transition(LifecycleState::NotStarted, LifecycleState::Running)
            .unwrap();

        let (pull_tx, pulls) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(
            listener,
            Lanes::Pull { pulls },
            log,
            Arc::clone(&lifecycle),
            token,
        );
        let run = tokio::spawn(dispatcher.run());

        let (reply, _rx) = tokio::sync::oneshot::channel();
        pull_tx
            .send(PullRequest { worker: 0, reply })
            .await
            .unwrap();

        let out = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(out.exit, DispatchExit::Crashed(ref r) if r.starts_with("accept failed")));
        assert!(out.listener.is_none());
        assert_eq!(lifecycle.get(), LifecycleState::Crashed);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.count_matching("crashed"), 1);
    }

    #[tokio::test]
    async fn crash_release_does_not_wait_on_a_full_logger() {
        let (tx, _mailbox) = mpsc::channel(1);
        let log = LoggerHandle::new(tx);
        assert!(log.try_log(LogLevel::Info, "fills the mailbox"));

        let (conn, mut client) = connected_pair(9).await;
        tokio::time::timeout(Duration::from_secs(1), release_at_crash(&log, conn))
            .await
            .expect("crash release must not block on the logger");

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn vanished_pool_crashes() {
        let (log, _log_join) = Logger::spawn(Box::new(MemorySink::new()), 64, LogLevel::Info);
        let token = CancellationToken::new();
        let listener = scripted_listener(Vec::new(), log.clone(), &token).await;
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle
            .transition(LifecycleState::NotStarted, LifecycleState::Running)
            .unwrap();

        let (pull_tx, pulls) = mpsc::channel::<PullRequest>(4);
        drop(pull_tx);
        let out = Dispatcher::new(listener, Lanes::Pull { pulls }, log, lifecycle, token)
            .run()
            .await;
        assert_eq!(
            out.exit,
            DispatchExit::Crashed("every worker has exited".into())
        );
    }

    #[tokio::test]
    async fn cancellation_drains_pull_workers() {
        let (log, _log_join) = Logger::spawn(Box::new(MemorySink::new()), 64, LogLevel::Info);
        let token = CancellationToken::new();
        let listener = scripted_listener(Vec::new(), log.clone(), &token).await;
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle
            .transition(LifecycleState::NotStarted, LifecycleState::Running)
            .unwrap();

        let (pull_tx, pulls) = mpsc::channel(4);
        let run = tokio::spawn(
            Dispatcher::new(listener, Lanes::Pull { pulls }, log, lifecycle, token.clone()).run(),
        );

        let (reply, rx) = tokio::sync::oneshot::channel();
        pull_tx
            .send(PullRequest { worker: 0, reply })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        assert!(matches!(rx.await, Ok(Dispatch::Terminate)));
        drop(pull_tx);
        let out = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.exit, DispatchExit::Drained);
        let listener = out.listener.unwrap();
        listener.join().await.unwrap();
    }
}
