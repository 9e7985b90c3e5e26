//! # Global runtime configuration.
//!
//! [`Config`] defines the supervisor's behavior: which endpoint to bind, how many
//! workers to run, how units reach them, whether in-flight work may be interrupted
//! on shutdown, and how the logger buffers and filters.
//!
//! # Example
//! ```
//! use connvisor::{Config, DispatchMode, WorkerKind};
//!
//! let mut cfg = Config::default();
//! cfg.endpoint = "tcp://127.0.0.1:0".into();
//! cfg.pool_size = 8;
//! cfg.dispatch = DispatchMode::PushSelect;
//! cfg.worker = WorkerKind::Interruptable;
//!
//! assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
//! assert!(cfg.validate().is_ok());
//! ```

use crate::error::RuntimeError;
use crate::message::LogLevel;

/// How accepted connections reach workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Idle workers ask for work; the supervisor accepts only on demand.
    #[default]
    Pull,
    /// The supervisor accepts while some worker is idle and pushes the unit into
    /// that worker's mailbox. At most `pool_size` units are ever in flight.
    PushSelect,
}

/// Which worker implementation the pool runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkerKind {
    /// Finishes every unit it started before exiting.
    #[default]
    Standard,
    /// Cancels its in-flight unit when shutdown is requested.
    Interruptable,
}

/// Global configuration for the supervisor, its workers and the logger.
#[derive(Clone, Debug)]
pub struct Config {
    /// Endpoint to bind. A `tcp://` or `http://` prefix is accepted and stripped.
    pub endpoint: String,
    /// Number of connection workers (must be greater than zero).
    pub pool_size: usize,
    /// Dispatch discipline; fixed for the lifetime of a supervisor instance.
    pub dispatch: DispatchMode,
    /// Worker implementation.
    pub worker: WorkerKind,
    /// Capacity of the logger mailbox (`0` is treated as `1`).
    pub log_capacity: usize,
    /// Lines below this level are discarded by the logger.
    pub log_level: LogLevel,
}

impl Config {
    /// Endpoint with any scheme prefix and trailing slash removed.
    pub fn bind_addr(&self) -> &str {
        let addr = self.endpoint.trim();
        let addr = addr
            .strip_prefix("tcp://")
            .or_else(|| addr.strip_prefix("http://"))
            .unwrap_or(addr);
        addr.trim_end_matches('/')
    }

    /// Returns the logger mailbox capacity, clamped to a minimum of 1.
    #[inline]
    pub fn log_capacity_clamped(&self) -> usize {
        self.log_capacity.max(1)
    }

    /// Rejects configurations that cannot be started.
    ///
    /// # Errors
    /// [`RuntimeError::InvalidConfig`] for an empty endpoint or a zero pool size.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.pool_size == 0 {
            return Err(RuntimeError::InvalidConfig {
                reason: "pool_size must be greater than zero".to_string(),
            });
        }
        if self.bind_addr().is_empty() {
            return Err(RuntimeError::InvalidConfig {
                reason: format!("endpoint {:?} has no address", self.endpoint),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `endpoint = "127.0.0.1:10001"`
    /// - `pool_size = 4`
    /// - `dispatch = DispatchMode::Pull`
    /// - `worker = WorkerKind::Standard`
    /// - `log_capacity = 1024`
    /// - `log_level = LogLevel::Info`
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:10001".to_string(),
            pool_size: 4,
            dispatch: DispatchMode::default(),
            worker: WorkerKind::default(),
            log_capacity: 1024,
            log_level: LogLevel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_prefixes() {
        let mut cfg = Config::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:10001");

        cfg.endpoint = "http://0.0.0.0:8080/".into();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");

        cfg.endpoint = "tcp://[::1]:9000".into();
        assert_eq!(cfg.bind_addr(), "[::1]:9000");
    }

    #[test]
    fn rejects_empty_pool_and_endpoint() {
        let mut cfg = Config::default();
        cfg.pool_size = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_config");

        let mut cfg = Config::default();
        cfg.endpoint = "tcp://".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn log_capacity_is_clamped() {
        let mut cfg = Config::default();
        cfg.log_capacity = 0;
        assert_eq!(cfg.log_capacity_clamped(), 1);
    }
}
