//! # Centralized logger actor.
//!
//! Every other actor reports through a cloneable [`LoggerHandle`]; a single
//! [`Logger`] task owns the output sink and is the only writer to it.
//!
//! ## Architecture
//! ```text
//!   Supervisor ──┐
//!   Listener   ──┼── LogMessage::Log ──► [bounded mailbox] ──► Logger ──► sink
//!   Worker 1..N──┤                                              │
//!   Answerers  ──┘                                   "[<ctime>] <content>" + flush
//! ```
//!
//! ## Rules
//! - Fire-and-forget: senders never get a result back.
//! - Senders wait only while the mailbox is full; a terminated logger drops the line.
//! - Lines are written in dequeue order; interleaving across producers is not fixed.

mod actor;
mod handle;
mod sink;

pub use actor::{Logger, Sink};
pub use handle::LoggerHandle;
pub use sink::MemorySink;
