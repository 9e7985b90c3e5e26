use std::io;
use std::sync::Arc;

use crate::config::Config;
use crate::handlers::HandlerRef;
use crate::logger::Sink;

use super::listener::{Endpoint, TcpEndpoint};
use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`] with optional overrides.
pub struct SupervisorBuilder {
    cfg: Config,
    handler: HandlerRef,
    endpoint: Option<Arc<dyn Endpoint>>,
    sink: Option<Sink>,
}

impl SupervisorBuilder {
    /// Creates a builder serving every connection with `handler`.
    pub fn new(cfg: Config, handler: HandlerRef) -> Self {
        Self {
            cfg,
            handler,
            endpoint: None,
            sink: None,
        }
    }

    /// Sets where log lines are written (default: standard error).
    ///
    /// The sink is handed back after each graceful stop and reused on restart.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replaces the TCP endpoint derived from [`Config::endpoint`].
    pub fn with_endpoint(mut self, endpoint: Arc<dyn Endpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Builds the supervisor. Nothing is spawned or bound until `start()`.
    pub fn build(self) -> Supervisor {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| Arc::new(TcpEndpoint::new(self.cfg.bind_addr())));
        let sink = self.sink.unwrap_or_else(|| Box::new(io::stderr()));
        Supervisor::new_internal(self.cfg, self.handler, endpoint, sink)
    }
}
