//! # Asking side of the bridge.
//!
//! [`Asker::ask`] sends one question, suspends only the calling task until the
//! worker's completion counter moves past the value this asker last saw, then
//! takes exactly one answer.
//!
//! ```text
//! ask(q) ── Question(q) ──► worker mailbox
//!    │                         │ respond ─► Answer ─► outbox
//!    │                         └─ progress.complete()
//!    └── advanced_past(last_seen) ──► outbox.recv() ──► Response
//! ```
//!
//! ## Rules
//! - `ask` takes `&mut self`: one outstanding question per asker, answers in order.
//! - An answer left behind by a dropped `ask` future is discarded by the next
//!   `ask`, never returned for a different question.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::Progress;
use crate::error::AskError;
use crate::handlers::{Respond, Response};
use crate::logger::LoggerHandle;
use crate::message::{Answer, WorkerMessage};

use super::answerer::Answerer;

/// Question mailbox depth; one outstanding question plus a `Terminate`.
const MAILBOX: usize = 2;

/// Exclusive handle to one answer worker.
pub struct Asker<Q>
where
    Q: Send + 'static,
{
    name: Arc<str>,
    mailbox: mpsc::Sender<WorkerMessage<Q>>,
    answers: mpsc::Receiver<Answer<Response>>,
    progress: Arc<Progress>,
    last_seen: u64,
    unanswered: u64,
    join: JoinHandle<()>,
}

impl<Q> Asker<Q>
where
    Q: Send + 'static,
{
    /// Spawns a standalone answer worker and returns the handle that talks to it.
    pub fn spawn(
        name: impl Into<Arc<str>>,
        responder: Arc<dyn Respond<Q>>,
        logger: LoggerHandle,
    ) -> Self {
        Self::spawn_inner(0, name.into(), responder, logger, None)
    }

    pub(crate) fn spawn_inner(
        id: usize,
        name: Arc<str>,
        responder: Arc<dyn Respond<Q>>,
        logger: LoggerHandle,
        ready: Option<mpsc::Sender<usize>>,
    ) -> Self {
        let (mailbox, mailbox_rx) = mpsc::channel(MAILBOX);
        let (outbox, answers) = mpsc::channel(1);
        let progress = Arc::new(Progress::new());

        let worker = Answerer {
            id,
            name: Arc::clone(&name),
            responder,
            mailbox: mailbox_rx,
            outbox,
            progress: Arc::clone(&progress),
            logger,
            ready,
        };
        let join = tokio::spawn(worker.run());

        Self {
            name,
            mailbox,
            answers,
            progress,
            last_seen: 0,
            unanswered: 0,
            join,
        }
    }

    /// Asks one question and waits for its answer.
    ///
    /// # Errors
    /// - [`AskError::WorkerGone`] if the worker exited before answering.
    /// - [`AskError::Failed`] if the responder failed or broke the response contract.
    pub async fn ask(&mut self, question: Q) -> Result<Response, AskError> {
        self.post(question).await?;
        self.answer().await
    }

    /// Puts one question into the worker's mailbox.
    pub(crate) async fn post(&mut self, question: Q) -> Result<(), AskError> {
        // Drop answers to questions whose ask was abandoned mid-wait.
        while self.unanswered > 0 {
            self.answers.recv().await.ok_or(AskError::WorkerGone)?;
            self.unanswered -= 1;
        }

        self.mailbox
            .send(WorkerMessage::Question(question))
            .await
            .map_err(|_| AskError::WorkerGone)?;
        self.unanswered += 1;
        Ok(())
    }

    /// Waits for the answer to the last posted question.
    pub(crate) async fn answer(&mut self) -> Result<Response, AskError> {
        self.last_seen = self
            .progress
            .advanced_past(self.last_seen)
            .await
            .map_err(|_| AskError::WorkerGone)?;
        let answer = self.answers.recv().await.ok_or(AskError::WorkerGone)?;
        self.unanswered -= 1;

        answer.content.map_err(AskError::Failed)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared completion counter of the worker behind this asker.
    #[inline]
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Sends `Terminate` and waits for the worker to exit.
    pub async fn shutdown(self) {
        let _ = self.mailbox.send(WorkerMessage::Terminate).await;
        if let Err(err) = self.join.await {
            tracing::error!(worker = %self.name, error = %err, "answer worker failed");
        }
    }
}
