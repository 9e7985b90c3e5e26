//! # connvisor
//!
//! **Connvisor** is a small connection-dispatch runtime for Tokio.
//!
//! A [`Supervisor`] binds one endpoint, owns a centralized [`Logger`], and feeds
//! accepted connections to a fixed pool of workers that each run a caller-supplied
//! [`Handler`]. A handler fault never takes down a worker, and a fault in the
//! dispatch path itself moves the supervisor into a distinct crashed state.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                        ┌───────────────────────────────┐
//!                        │ Supervisor                    │
//!   OS ◄── accept() ──── │  Listener (on-demand accept)  │
//!                        │  dispatch task (pull | push)  │
//!                        └──────┬──────────┬─────────┬───┘
//!                 Dispatch::Unit│          │         │
//!                               ▼          ▼         ▼
//!                        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!                        │ worker-0 │ │ worker-1 │ │ worker-N │
//!                        │ Handler  │ │ Handler  │ │ Handler  │
//!                        └────┬─────┘ └────┬─────┘ └────┬─────┘
//!                             │ LogMessage │            │
//!                             ▼            ▼            ▼
//!                        ┌───────────────────────────────┐
//!                        │ Logger (single sink writer)   │
//!                        └───────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! NotStarted ──start()──► Running ──stop()──► Stopped ──start()──► Running ...
//!                            │
//!                            └── accept/dispatch fault ──► Crashed (terminal, nothing joined)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | Start/stop a listener plus worker pool; crash detection.     | [`Supervisor`], [`SupervisorBuilder`]     |
//! | **Handlers**      | Per-connection code, as a trait or a closure.                | [`Handler`], [`HandlerFn`]                |
//! | **Workers**       | Run-to-completion or interruptable on shutdown.              | [`WorkerKind`]                            |
//! | **Dispatch**      | Pull (on-demand) or push+select (bounded in-flight).         | [`DispatchMode`]                          |
//! | **Logging**       | Centralized actor, level filter, `ctime` timestamps.         | [`Logger`], [`LoggerHandle`]              |
//! | **Ask bridge**    | Ask a worker a question; suspend only the calling task.      | [`Asker`], [`AnswerPool`], [`Respond`]    |
//! | **Errors**        | Typed errors with stable labels.                             | [`RuntimeError`], [`HandlerError`], [`AskError`] |
//! | **Configuration** | Endpoint, pool size, dispatch, worker kind, logger settings. | [`Config`]                                |
//!
//! ## Example
//! ```rust
//! use futures::FutureExt;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//! use connvisor::{Config, HandlerError, HandlerFn, MemorySink, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.endpoint = "127.0.0.1:0".into();
//!     cfg.pool_size = 2;
//!
//!     let hello = HandlerFn::arc("hello", |conn, _ctx| {
//!         async move {
//!             conn.stream_mut().write_all(b"Hello, World!\n").await?;
//!             Ok::<_, HandlerError>(())
//!         }
//!         .boxed()
//!     });
//!
//!     let mut sup = Supervisor::builder(cfg, hello)
//!         .with_sink(Box::new(MemorySink::new()))
//!         .build();
//!     sup.start().await?;
//!
//!     let addr = sup.local_addr().expect("bound");
//!     let mut client = tokio::net::TcpStream::connect(addr).await?;
//!     let mut reply = String::new();
//!     client.read_to_string(&mut reply).await?;
//!     assert_eq!(reply, "Hello, World!\n");
//!
//!     sup.stop().await?;
//!     Ok(())
//! }
//! ```
mod bridge;
mod config;
mod connection;
mod core;
mod error;
mod handlers;
mod logger;
mod message;

// ---- Public re-exports ----

pub use bridge::{AnswerPool, Asker};
pub use config::{Config, DispatchMode, WorkerKind};
pub use connection::Connection;
pub use core::{
    Accept, Endpoint, LifecycleState, Progress, Supervisor, SupervisorBuilder, TcpEndpoint,
    WorkerExited,
};
pub use error::{AskError, HandlerError, RuntimeError};
pub use handlers::{Handler, HandlerFn, HandlerRef, Respond, RespondFn, Response};
pub use logger::{Logger, LoggerHandle, MemorySink, Sink};
pub use message::{Answer, Log, LogLevel, LogMessage, WorkerMessage};
