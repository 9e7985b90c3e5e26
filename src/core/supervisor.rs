//! # Supervisor: owns the logger, the listener and the worker pool.
//!
//! ```text
//! start():
//!   validate cfg ─► spawn Logger ─► bind endpoint ─► spawn Listener ─► spawn Workers ─► Running
//!                                        │                                              │
//!                                        └─ error: terminate Logger, stay stopped       ▼
//!                                                                              spawn dispatch task
//!
//! stop() (graceful):
//!   cancel runtime token ─► dispatch drains ─► join Listener ─► join Workers (in turn)
//!                        ─► terminate + join Logger ─► Stopped
//!
//! crash (any fault in the dispatch path):
//!   one fatal log line ─► Crashed. Nothing is joined.
//! ```
//!
//! ## Rules
//! - `start()` from `Running` or `Crashed` fails with no side effects.
//! - `stop()` from anything but `Running` fails with no side effects.
//! - Graceful shutdown and crash are separate paths: the crash path never waits on
//!   workers or the logger, whose state is unknown at that point.
//! - The sink survives a graceful stop and is reused by the next `start()`.
//!
//! # Example
//! ```rust,no_run
//! use futures::FutureExt;
//! use tokio::io::AsyncWriteExt;
//! use connvisor::{Config, HandlerError, HandlerFn, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hello = HandlerFn::arc("hello", |conn, _ctx| {
//!         async move {
//!             conn.stream_mut().write_all(b"Hello, World!\n").await?;
//!             Ok::<_, HandlerError>(())
//!         }
//!         .boxed()
//!     });
//!
//!     let mut sup = Supervisor::builder(Config::default(), hello).build();
//!     sup.serve().await?;
//!     Ok(())
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::handlers::HandlerRef;
use crate::logger::{Logger, LoggerHandle, Sink};
use crate::message::LogLevel;

use super::builder::SupervisorBuilder;
use super::dispatch::{DispatchExit, Dispatched, Dispatcher};
use super::lifecycle::{Lifecycle, LifecycleState};
use super::listener::{Endpoint, Listener};
use super::registry::Registry;
use super::shutdown::wait_for_shutdown_signal;

/// Everything spawned by one `start()`.
struct Running {
    token: CancellationToken,
    logger: LoggerHandle,
    logger_join: JoinHandle<Sink>,
    registry: Registry,
    dispatch: JoinHandle<Dispatched>,
    local_addr: Option<SocketAddr>,
}

/// Connection-dispatch runtime.
pub struct Supervisor {
    cfg: Config,
    handler: HandlerRef,
    endpoint: Arc<dyn Endpoint>,
    sink: Option<Sink>,
    lifecycle: Arc<Lifecycle>,
    join_attempts: AtomicU64,
    running: Option<Running>,
    last_completions: Vec<(String, u64)>,
}

impl Supervisor {
    /// Starts building a supervisor that serves every connection with `handler`.
    pub fn builder(cfg: Config, handler: HandlerRef) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, handler)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        handler: HandlerRef,
        endpoint: Arc<dyn Endpoint>,
        sink: Sink,
    ) -> Self {
        Self {
            cfg,
            handler,
            endpoint,
            sink: Some(sink),
            lifecycle: Arc::new(Lifecycle::new()),
            join_attempts: AtomicU64::new(0),
            running: None,
            last_completions: Vec::new(),
        }
    }

    /// Spawns the logger, binds the endpoint and spawns the listener and workers.
    ///
    /// Returns once everything is spawned and the endpoint is bound.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyRunning`] if the state is `Running` or `Crashed`.
    /// - [`RuntimeError::InvalidConfig`] if the configuration is rejected.
    /// - [`RuntimeError::Bind`] if the endpoint cannot be bound; the logger is
    ///   shut down again and the state is unchanged.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        let state = self.lifecycle.get();
        if !state.can_start() {
            return Err(RuntimeError::AlreadyRunning { state });
        }
        self.cfg.validate()?;

        let sink = self.sink.take().unwrap_or_else(|| Box::new(io::stderr()));
        let (logger, logger_join) =
            Logger::spawn(sink, self.cfg.log_capacity_clamped(), self.cfg.log_level);

        let label = self.endpoint.describe();
        let acceptor = match self.endpoint.bind().await {
            Ok(acceptor) => acceptor,
            Err(source) => {
                logger.error(format!("failed to bind {label}: {source}")).await;
                logger.terminate().await;
                if let Ok(sink) = logger_join.await {
                    self.sink = Some(sink);
                }
                return Err(RuntimeError::Bind {
                    endpoint: label,
                    source,
                });
            }
        };

        let token = CancellationToken::new();
        let listener = Listener::spawn(acceptor, logger.clone(), token.child_token(), label);
        let local_addr = listener.local_addr();
        let (registry, lanes) = Registry::spawn(&self.cfg, &self.handler, &logger, &token);

        self.lifecycle
            .transition(state, LifecycleState::Running)
            .map_err(|state| RuntimeError::AlreadyRunning { state })?;

        let dispatcher = Dispatcher::new(
            listener,
            lanes,
            logger.clone(),
            Arc::clone(&self.lifecycle),
            token.clone(),
        );
        let dispatch = tokio::spawn(dispatcher.run());

        logger
            .info(format!(
                "server started: {} workers, {:?} dispatch, {:?} workers",
                self.cfg.pool_size, self.cfg.dispatch, self.cfg.worker
            ))
            .await;
        tracing::debug!(pool = self.cfg.pool_size, ?local_addr, "supervisor running");

        self.running = Some(Running {
            token,
            logger,
            logger_join,
            registry,
            dispatch,
            local_addr,
        });
        Ok(())
    }

    /// Graceful shutdown: stop accepting, let every worker finish, join everything.
    ///
    /// Standard workers finish the unit they are serving; interruptable workers
    /// cancel it. Blocks until the listener, every worker and the logger are joined.
    ///
    /// # Errors
    /// - [`RuntimeError::NotRunning`] if the state is not `Running`.
    /// - [`RuntimeError::Crashed`] if the dispatch path crashed while draining;
    ///   nothing is joined in that case.
    pub async fn stop(&mut self) -> Result<(), RuntimeError> {
        let state = self.lifecycle.get();
        if state != LifecycleState::Running {
            return Err(RuntimeError::NotRunning { state });
        }
        let Some(running) = self.running.take() else {
            return Err(RuntimeError::NotRunning { state });
        };
        let Running {
            token,
            logger,
            logger_join,
            mut registry,
            dispatch,
            ..
        } = running;

        logger.info("server stopping").await;
        token.cancel();

        let dispatched = match dispatch.await {
            Ok(dispatched) => dispatched,
            Err(err) => {
                let reason = format!("dispatch task failed: {err}");
                if self
                    .lifecycle
                    .transition(LifecycleState::Running, LifecycleState::Crashed)
                    .is_ok()
                {
                    logger.try_log(LogLevel::Fatal, format!("supervisor crashed: {reason}"));
                }
                return Err(RuntimeError::Crashed { reason });
            }
        };
        let listener = match dispatched.exit {
            DispatchExit::Drained => dispatched.listener,
            DispatchExit::Crashed(reason) => return Err(RuntimeError::Crashed { reason }),
        };

        if let Some(listener) = listener {
            self.join_attempts.fetch_add(1, Ordering::Relaxed);
            if let Err(err) = listener.join().await {
                logger.error(format!("listener task failed: {err}")).await;
            }
        }
        registry.join_all(&logger, &self.join_attempts).await;
        self.last_completions = registry.completions();

        logger.info("server stopped").await;
        logger.terminate().await;
        self.join_attempts.fetch_add(1, Ordering::Relaxed);
        match logger_join.await {
            Ok(sink) => self.sink = Some(sink),
            Err(err) => tracing::error!(error = %err, "logger task failed"),
        }

        self.lifecycle
            .transition(LifecycleState::Running, LifecycleState::Stopped)
            .map_err(|state| RuntimeError::NotRunning { state })
    }

    /// Starts, serves until `SIGINT`/`SIGTERM`/`SIGQUIT` (or `Ctrl-C`), then stops gracefully.
    ///
    /// # Errors
    /// Anything `start()` or `stop()` returns; [`RuntimeError::Crashed`] if the
    /// supervisor crashes while serving; [`RuntimeError::Signal`] if signal
    /// listeners cannot be registered.
    pub async fn serve(&mut self) -> Result<(), RuntimeError> {
        self.start().await?;
        let lifecycle = Arc::clone(&self.lifecycle);

        tokio::select! {
            signal = wait_for_shutdown_signal() => {
                let name = match signal {
                    Ok(name) => name,
                    Err(source) => {
                        self.stop().await?;
                        return Err(RuntimeError::Signal { source });
                    }
                };
                if let Some(running) = &self.running {
                    running.logger.info(format!("received {name}; shutting down")).await;
                }
                self.stop().await
            }
            _ = lifecycle.left(LifecycleState::Running) => {
                Err(RuntimeError::Crashed { reason: self.crash_reason().await })
            }
        }
    }

    async fn crash_reason(&mut self) -> String {
        let Some(running) = self.running.as_mut() else {
            return "unknown".to_string();
        };
        match (&mut running.dispatch).await {
            Ok(Dispatched {
                exit: DispatchExit::Crashed(reason),
                ..
            }) => reason,
            Ok(_) => "dispatch ended unexpectedly".to_string(),
            Err(err) => format!("dispatch task failed: {err}"),
        }
    }

    /// True while the supervisor is `Running`.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.lifecycle.get() == LifecycleState::Running
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }

    /// Address actually bound by the current run (useful with port `0`).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().and_then(|r| r.local_addr)
    }

    /// Handle to the current run's logger.
    pub fn logger(&self) -> Option<LoggerHandle> {
        self.running.as_ref().map(|r| r.logger.clone())
    }

    /// `(worker name, completed units)` of the current run, or of the last
    /// stopped run when not running.
    pub fn completions(&self) -> Vec<(String, u64)> {
        match &self.running {
            Some(running) => running.registry.completions(),
            None => self.last_completions.clone(),
        }
    }

    /// Number of task joins performed by `stop()` so far.
    #[inline]
    pub fn join_attempts(&self) -> u64 {
        self.join_attempts.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

impl Drop for Supervisor {
    /// Signals every task of the current run to stop. Nothing is joined.
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.token.cancel();
        }
    }
}
