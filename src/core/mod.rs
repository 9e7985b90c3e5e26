//! Runtime core: lifecycle, dispatch and workers.
//!
//! The public API from this module is [`Supervisor`] (built with
//! [`SupervisorBuilder`]), the endpoint traits, and the observable state types.
//!
//! Internal modules:
//! - [`listener`]: binds the endpoint and accepts on demand;
//! - [`dispatch`]: moves connections to workers, drains or crashes;
//! - [`worker`] / [`interruptable`]: the two worker implementations;
//! - [`source`]: how a worker obtains its next unit (pull or push);
//! - [`runner`]: runs one handler invocation with panic capture;
//! - [`registry`]: spawns and joins the pool;
//! - [`progress`]: per-worker completion counters;
//! - [`lifecycle`]: supervisor state machine;
//! - [`shutdown`]: OS signal handling for `serve()`.

mod builder;
mod dispatch;
mod interruptable;
mod lifecycle;
mod listener;
mod progress;
mod registry;
pub(crate) mod runner;
mod shutdown;
mod source;
mod supervisor;
mod worker;

pub use builder::SupervisorBuilder;
pub use lifecycle::LifecycleState;
pub use listener::{Accept, Endpoint, TcpEndpoint};
pub use progress::{Progress, WorkerExited};
pub use supervisor::Supervisor;
