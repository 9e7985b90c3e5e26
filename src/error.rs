//! Error types used by the connvisor runtime, its workers and the ask bridge.
//!
//! This module defines three public enums:
//!
//! - [`RuntimeError`]: errors raised by the supervisor's lifecycle operations.
//! - [`HandlerError`]: faults raised by a single handler invocation.
//! - [`AskError`]: failures of the ask/answer bridge.
//!
//! All of them provide `as_label` for logs/metrics. Crate-internal [`DispatchFault`]
//! classifies what drives a supervisor into the crashed state.

use std::io;

use thiserror::Error;

use crate::core::LifecycleState;

/// # Errors produced by the connvisor runtime.
///
/// Lifecycle misuse (`AlreadyRunning`, `NotRunning`) is reported synchronously and
/// never has side effects.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `start()` was called while the supervisor is not startable.
    #[error("server is already running (state: {state})")]
    AlreadyRunning {
        /// State observed when the call was rejected.
        state: LifecycleState,
    },

    /// `stop()` was called while the supervisor is not running.
    #[error("server is not running (state: {state})")]
    NotRunning {
        /// State observed when the call was rejected.
        state: LifecycleState,
    },

    /// Configuration rejected before anything was spawned.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Binding the endpoint failed (port in use, permission, bad address).
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Endpoint description.
        endpoint: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The dispatch loop crashed; workers and logger were left unjoined.
    #[error("supervisor crashed: {reason}")]
    Crashed {
        /// Crash reason, as logged.
        reason: String,
    },

    /// Registering OS signal listeners failed.
    #[error("failed to wait for shutdown signal: {source}")]
    Signal {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use connvisor::{LifecycleState, RuntimeError};
    ///
    /// let err = RuntimeError::NotRunning { state: LifecycleState::Stopped };
    /// assert_eq!(err.as_label(), "runtime_not_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyRunning { .. } => "runtime_already_running",
            RuntimeError::NotRunning { .. } => "runtime_not_running",
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
            RuntimeError::Bind { .. } => "runtime_bind_failed",
            RuntimeError::Crashed { .. } => "runtime_crashed",
            RuntimeError::Signal { .. } => "runtime_signal_failed",
        }
    }
}

/// # Faults produced by one handler invocation.
///
/// A `HandlerError` never escapes the worker that owns the unit: it is logged,
/// the unit is released and the worker moves on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler reported a failure.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler produced a response that violates the response contract.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// What is wrong with the response.
        reason: String,
    },

    /// Handler panicked; the panic was caught by the worker.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },

    /// In-flight invocation was cancelled by an interruptable worker.
    #[error("invocation cancelled")]
    Canceled,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use connvisor::HandlerError;
    ///
    /// assert_eq!(HandlerError::fail("boom").as_label(), "handler_failed");
    /// assert_eq!(HandlerError::Canceled.as_label(), "handler_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::InvalidResponse { .. } => "handler_invalid_response",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Canceled => "handler_canceled",
        }
    }
}

impl From<io::Error> for HandlerError {
    fn from(err: io::Error) -> Self {
        HandlerError::Fail {
            error: err.to_string(),
        }
    }
}

/// # Failures of the ask/answer bridge.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    /// The answering worker has terminated (or its mailbox is closed).
    #[error("worker is gone")]
    WorkerGone,

    /// The worker answered, but the responder failed for this question.
    #[error(transparent)]
    Failed(#[from] HandlerError),
}

impl AskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AskError::WorkerGone => "ask_worker_gone",
            AskError::Failed(_) => "ask_failed",
        }
    }
}

/// Faults in the accept/dispatch path itself: each one crashes the supervisor.
#[derive(Error, Debug)]
pub(crate) enum DispatchFault {
    #[error("accept failed: {source}")]
    Accept {
        #[source]
        source: io::Error,
    },

    #[error("listener terminated unexpectedly")]
    ListenerGone,

    #[error("every worker has exited")]
    PoolVanished,

    #[error("dispatch loop panicked: {info}")]
    Panicked { info: String },
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
