//! # Answer worker.
//!
//! Receives `Question`s in arrival order, answers each with a [`Respond`]
//! implementation, publishes the [`Answer`] and then advances its completion
//! counter. Faults are answered, not propagated: the worker keeps going.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::Progress;
use crate::core::runner::respond_once;
use crate::handlers::{Respond, Response};
use crate::logger::LoggerHandle;
use crate::message::{Answer, WorkerMessage};

/// Answers between two "completed N questions" lines.
pub(crate) const PROGRESS_EVERY: u64 = 1000;

pub(crate) struct Answerer<Q>
where
    Q: Send + 'static,
{
    pub(crate) id: usize,
    pub(crate) name: Arc<str>,
    pub(crate) responder: Arc<dyn Respond<Q>>,
    pub(crate) mailbox: mpsc::Receiver<WorkerMessage<Q>>,
    pub(crate) outbox: mpsc::Sender<Answer<Response>>,
    pub(crate) progress: Arc<Progress>,
    pub(crate) logger: LoggerHandle,
    /// Present in a pool: announces "ready for a new question" before each receive.
    pub(crate) ready: Option<mpsc::Sender<usize>>,
}

impl<Q> Answerer<Q>
where
    Q: Send + 'static,
{
    pub(crate) async fn run(mut self) {
        self.logger.info(format!("{} started", self.name)).await;

        loop {
            if let Some(ready) = &self.ready {
                let _ = ready.send(self.id).await;
            }

            match self.mailbox.recv().await {
                Some(WorkerMessage::Question(question)) => {
                    let content = respond_once(self.responder.as_ref(), question).await;
                    if let Err(err) = &content {
                        self.logger
                            .error(format!("{}: question failed: {err}", self.name))
                            .await;
                    }
                    if self.outbox.send(Answer { content }).await.is_err() {
                        self.logger
                            .warn(format!("{}: asker gone; exiting", self.name))
                            .await;
                        break;
                    }
                    let n = self.progress.complete();
                    if n % PROGRESS_EVERY == 0 {
                        self.logger
                            .info(format!("{}: completed {n} questions", self.name))
                            .await;
                    }
                }
                Some(WorkerMessage::Terminate) => break,
                None => {
                    self.logger
                        .warn(format!("{}: mailbox closed; exiting", self.name))
                        .await;
                    break;
                }
            }
        }

        self.progress.close();
        self.logger
            .debug(format!("{} exited", self.name))
            .await;
    }
}
