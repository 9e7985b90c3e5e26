//! # Ask/answer bridge.
//!
//! Lets a task ask an answer worker a question and wait for the reply without
//! blocking anything but itself. The wait is driven by the worker's completion
//! counter ([`Progress`](crate::Progress)), not by polling.
//!
//! - [`Asker`]: exclusive handle to one answer worker.
//! - [`AnswerPool`]: shared front of several workers with a ready handshake.

mod answerer;
mod asker;
mod pool;

pub use asker::Asker;
pub use pool::AnswerPool;
