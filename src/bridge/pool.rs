//! # Pool of answer workers with a ready handshake.
//!
//! Each worker announces "ready" (its id) before every receive. [`AnswerPool::ask`]
//! takes the first announcement and routes the question to that worker, so a
//! question never queues behind a busy worker while another one is idle.
//!
//! ## Rules
//! - A ready id taken by an `ask` that is dropped before its question reaches the
//!   worker's mailbox is handed back, so the worker stays reachable.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::core::Progress;
use crate::error::AskError;
use crate::handlers::{Respond, Response};
use crate::logger::LoggerHandle;

use super::asker::Asker;

/// Shared front of `size` answer workers.
pub struct AnswerPool<Q>
where
    Q: Send + 'static,
{
    askers: Vec<Mutex<Asker<Q>>>,
    counters: Vec<Arc<Progress>>,
    ready: Mutex<mpsc::Receiver<usize>>,
    requeue: mpsc::WeakSender<usize>,
}

/// A ready announcement taken off the queue but not yet used.
struct ReadyToken {
    id: usize,
    requeue: Option<mpsc::WeakSender<usize>>,
}

impl ReadyToken {
    fn used(mut self) {
        self.requeue = None;
    }
}

impl Drop for ReadyToken {
    fn drop(&mut self) {
        if let Some(tx) = self.requeue.take().and_then(|weak| weak.upgrade()) {
            // One announcement per worker at most, so the queue always has room.
            let _ = tx.try_send(self.id);
        }
    }
}

impl<Q> AnswerPool<Q>
where
    Q: Send + 'static,
{
    /// Spawns `size` answer workers (at least one) sharing `responder`.
    pub fn spawn(size: usize, responder: Arc<dyn Respond<Q>>, logger: LoggerHandle) -> Self {
        let size = size.max(1);
        let (ready_tx, ready) = mpsc::channel(size);

        let askers: Vec<Asker<Q>> = (0..size)
            .map(|id| {
                Asker::spawn_inner(
                    id,
                    format!("answerer-{id}").into(),
                    Arc::clone(&responder),
                    logger.clone(),
                    Some(ready_tx.clone()),
                )
            })
            .collect();
        let counters = askers.iter().map(Asker::progress).collect();
        let requeue = ready_tx.downgrade();

        Self {
            askers: askers.into_iter().map(Mutex::new).collect(),
            counters,
            ready: Mutex::new(ready),
            requeue,
        }
    }

    /// Asks whichever worker becomes ready first.
    ///
    /// # Errors
    /// Same as [`Asker::ask`]; [`AskError::WorkerGone`] once every worker has exited.
    pub async fn ask(&self, question: Q) -> Result<Response, AskError> {
        let token = {
            let mut ready = self.ready.lock().await;
            let id = ready.recv().await.ok_or(AskError::WorkerGone)?;
            ReadyToken {
                id,
                requeue: Some(self.requeue.clone()),
            }
        };
        let mut asker = self
            .askers
            .get(token.id)
            .ok_or(AskError::WorkerGone)?
            .lock()
            .await;
        let posted = asker.post(question).await;
        token.used();
        posted?;
        asker.answer().await
    }

    /// Completed questions per worker, in id order.
    pub fn completions(&self) -> Vec<u64> {
        self.counters.iter().map(|p| p.current()).collect()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.askers.len()
    }

    /// Terminates and joins every worker in turn.
    pub async fn shutdown(self) {
        for asker in self.askers {
            asker.into_inner().shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::handlers::RespondFn;
    use crate::logger::{Logger, MemorySink};
    use crate::message::LogLevel;

    #[tokio::test]
    async fn spreads_concurrent_questions_over_workers() {
        let (log, _log_join) = Logger::spawn(Box::new(MemorySink::new()), 256, LogLevel::Info);
        let responder: Arc<dyn Respond<u32>> = RespondFn::arc(|n: u32| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Response::new(200).with_body(n.to_string()))
        });
        let pool = Arc::new(AnswerPool::spawn(4, responder, log));

        let tasks: Vec<_> = (0..16u32)
            .map(|n| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { (n, pool.ask(n).await) })
            })
            .collect();
        for task in tasks {
            let (n, res) = task.await.unwrap();
            assert_eq!(res.unwrap().body, n.to_string().into_bytes());
        }

        let completions = pool.completions();
        assert_eq!(completions.iter().sum::<u64>(), 16);
        assert!(completions.iter().filter(|&&c| c > 0).count() > 1);

        let pool = Arc::try_unwrap(pool).ok().unwrap();
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn dropped_ask_before_delivery_keeps_worker_reachable() {
        let (log, _log_join) = Logger::spawn(Box::new(MemorySink::new()), 64, LogLevel::Info);
        let responder: Arc<dyn Respond<u32>> = RespondFn::arc(|n: u32| async move {
            Ok(Response::new(200).with_body(n.to_string()))
        });
        let pool = AnswerPool::spawn(1, responder, log);

        assert_eq!(pool.ask(1).await.unwrap().body, b"1".to_vec());
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Another caller still owns the only worker.
        let held = pool.askers[0].lock().await;
        {
            let mut pending = Box::pin(pool.ask(2));
            assert!(futures::poll!(pending.as_mut()).is_pending());
        }
        drop(held);

        let res = tokio::time::timeout(Duration::from_secs(2), pool.ask(3))
            .await
            .expect("worker must stay reachable after an abandoned ask")
            .unwrap();
        assert_eq!(res.body, b"3".to_vec());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn logs_progress_every_thousand_answers() {
        let sink = MemorySink::new();
        let (log, _log_join) = Logger::spawn(Box::new(sink.clone()), 256, LogLevel::Info);
        let responder: Arc<dyn Respond<()>> =
            RespondFn::arc(|()| async { Ok(Response::new(204)) });
        let pool = AnswerPool::spawn(1, responder, log);

        for _ in 0..1000 {
            pool.ask(()).await.unwrap();
        }
        pool.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.count_matching("answerer-0: completed 1000 questions"), 1);
    }
}
