//! # Where a connection worker gets its next unit.
//!
//! Two disciplines, fixed per supervisor:
//! - **Pull**: the worker sends a [`PullRequest`] (with a `oneshot` reply slot) to the
//!   dispatcher and waits for the answer.
//! - **Push**: the dispatcher writes straight into the worker's own mailbox.
//!
//! Either way the worker sees one of three outcomes ([`Next`]) and must treat
//! "got `Terminate`" and "supervisor vanished" differently.

use tokio::sync::{mpsc, oneshot};

use crate::connection::Connection;
use crate::message::Dispatch;

/// Index of a worker within its pool.
pub(crate) type WorkerId = usize;

/// A worker asking the dispatcher for work.
#[derive(Debug)]
pub(crate) struct PullRequest {
    pub(crate) worker: WorkerId,
    pub(crate) reply: oneshot::Sender<Dispatch>,
}

/// Result of waiting for the next unit.
#[derive(Debug)]
pub(crate) enum Next {
    Unit(Connection),
    Terminate,
    /// The supervisor side is gone; nobody will ever send `Terminate`.
    Closed,
}

pub(crate) enum UnitSource {
    Pull {
        id: WorkerId,
        pulls: mpsc::Sender<PullRequest>,
        pending: Option<oneshot::Receiver<Dispatch>>,
    },
    Push {
        mailbox: mpsc::Receiver<Dispatch>,
    },
}

impl UnitSource {
    pub(crate) fn pull(id: WorkerId, pulls: mpsc::Sender<PullRequest>) -> Self {
        UnitSource::Pull {
            id,
            pulls,
            pending: None,
        }
    }

    pub(crate) fn push(mailbox: mpsc::Receiver<Dispatch>) -> Self {
        UnitSource::Push { mailbox }
    }

    /// Waits for the next unit.
    ///
    /// Cancel-safe: an outstanding pull survives a dropped future and is resumed by
    /// the next call, or handed back by [`UnitSource::abandon`].
    pub(crate) async fn next(&mut self) -> Next {
        match self {
            UnitSource::Pull { id, pulls, pending } => {
                if pending.is_none() {
                    let (tx, rx) = oneshot::channel();
                    let req = PullRequest {
                        worker: *id,
                        reply: tx,
                    };
                    if pulls.send(req).await.is_err() {
                        return Next::Closed;
                    }
                    *pending = Some(rx);
                }
                let Some(rx) = pending.as_mut() else {
                    return Next::Closed;
                };
                let res = rx.await;
                *pending = None;
                match res {
                    Ok(Dispatch::Unit(conn)) => Next::Unit(conn),
                    Ok(Dispatch::Terminate) => Next::Terminate,
                    Err(_) => Next::Closed,
                }
            }
            UnitSource::Push { mailbox } => match mailbox.recv().await {
                Some(Dispatch::Unit(conn)) => Next::Unit(conn),
                Some(Dispatch::Terminate) => Next::Terminate,
                None => Next::Closed,
            },
        }
    }

    /// Stops receiving and returns any unit that was already handed over.
    pub(crate) fn abandon(&mut self) -> Vec<Connection> {
        let mut salvaged = Vec::new();
        match self {
            UnitSource::Pull { pending, .. } => {
                if let Some(mut rx) = pending.take() {
                    rx.close();
                    if let Ok(Dispatch::Unit(conn)) = rx.try_recv() {
                        salvaged.push(conn);
                    }
                }
            }
            UnitSource::Push { mailbox } => {
                mailbox.close();
                while let Ok(msg) = mailbox.try_recv() {
                    if let Dispatch::Unit(conn) = msg {
                        salvaged.push(conn);
                    }
                }
            }
        }
        salvaged
    }
}

/// Tells a push+select dispatcher that a worker is idle again.
#[derive(Debug, Clone)]
pub(crate) struct CompletionSignal {
    id: WorkerId,
    tx: Option<mpsc::UnboundedSender<WorkerId>>,
}

impl CompletionSignal {
    pub(crate) fn new(id: WorkerId, tx: Option<mpsc::UnboundedSender<WorkerId>>) -> Self {
        Self { id, tx }
    }

    pub(crate) fn notify(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::tests::connected_pair;

    #[tokio::test]
    async fn pull_distinguishes_terminate_from_closed() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut source = UnitSource::pull(3, tx);

        let serve = tokio::spawn(async move {
            let req = rx.recv().await.unwrap();
            assert_eq!(req.worker, 3);
            req.reply.send(Dispatch::Terminate).unwrap();
            // Next request: drop the reply slot, then the receiver.
            let req = rx.recv().await.unwrap();
            drop(req);
        });

        assert!(matches!(source.next().await, Next::Terminate));
        assert!(matches!(source.next().await, Next::Closed));
        serve.await.unwrap();
        assert!(matches!(source.next().await, Next::Closed));
    }

    #[tokio::test]
    async fn abandoned_pull_hands_back_delivered_unit() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut source = UnitSource::pull(0, tx);

        // Start a pull, then drop the future before the reply arrives.
        {
            let fut = source.next();
            tokio::pin!(fut);
            assert!(futures::poll!(fut.as_mut()).is_pending());
        }
        let req = rx.recv().await.unwrap();
        let (conn, _client) = connected_pair(9).await;
        req.reply.send(Dispatch::Unit(conn)).unwrap();

        let salvaged = source.abandon();
        assert_eq!(salvaged.len(), 1);
        assert_eq!(salvaged[0].id(), 9);
    }

    #[tokio::test]
    async fn push_mailbox_closed_means_closed() {
        let (tx, rx) = mpsc::channel(2);
        let mut source = UnitSource::push(rx);
        tx.send(Dispatch::Terminate).await.unwrap();
        drop(tx);
        assert!(matches!(source.next().await, Next::Terminate));
        assert!(matches!(source.next().await, Next::Closed));
    }

    #[tokio::test]
    async fn completion_signal_reports_worker_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        CompletionSignal::new(5, Some(tx)).notify();
        CompletionSignal::new(6, None).notify();
        assert_eq!(rx.recv().await, Some(5));
        assert!(rx.try_recv().is_err());
    }
}
