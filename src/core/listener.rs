//! # Listener actor: owns the bound endpoint.
//!
//! The listener accepts only on demand. Each pull is a `oneshot` reply slot; the
//! listener blocks in `accept()` until a client arrives and moves the connection
//! into that slot.
//!
//! ```text
//! dispatch ── Reply slot ──► Listener ── accept() ──► OS
//!     ▲                          │
//!     └──── io::Result<Connection> ◄┘
//! ```
//!
//! ## Rules
//! - Transient accept errors (aborted/reset/interrupted) are logged and retried.
//! - Any other accept error is handed to the dispatcher, which treats it as a crash.
//! - Cancelling the listener token stops accepting; the endpoint is closed on exit.
//! - A connection whose requester went away is closed with a warning, never dropped silently.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::DispatchFault;
use crate::logger::LoggerHandle;

/// A bound endpoint that yields connections.
#[async_trait]
pub trait Accept: Send + 'static {
    /// Waits for the next connection.
    async fn accept(&mut self) -> io::Result<Connection>;

    /// Bound address, when there is one.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Something that can be bound into an [`Accept`].
///
/// The supervisor binds once per `start()`; a bind error keeps it out of `Running`.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    async fn bind(&self) -> io::Result<Box<dyn Accept>>;

    /// Description used in log lines and errors.
    fn describe(&self) -> String;
}

/// TCP endpoint, e.g. `127.0.0.1:10001` (port `0` picks an ephemeral port).
#[derive(Debug, Clone)]
pub struct TcpEndpoint {
    addr: String,
}

impl TcpEndpoint {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
    async fn bind(&self) -> io::Result<Box<dyn Accept>> {
        let listener = TcpListener::bind(&self.addr).await?;
        Ok(Box::new(TcpAcceptor {
            listener,
            next_id: 0,
        }))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

struct TcpAcceptor {
    listener: TcpListener,
    next_id: u64,
}

#[async_trait]
impl Accept for TcpAcceptor {
    async fn accept(&mut self) -> io::Result<Connection> {
        let (stream, _peer) = self.listener.accept().await?;
        self.next_id += 1;
        Ok(Connection::new(self.next_id, stream))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

/// Accept errors that leave the listening socket usable.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

type Reply = oneshot::Sender<io::Result<Connection>>;

pub(crate) struct Listener {
    acceptor: Box<dyn Accept>,
    requests: mpsc::Receiver<Reply>,
    logger: LoggerHandle,
    label: String,
}

impl Listener {
    /// Spawns the listener task around an already-bound acceptor.
    pub(crate) fn spawn(
        acceptor: Box<dyn Accept>,
        logger: LoggerHandle,
        token: CancellationToken,
        label: String,
    ) -> ListenerHandle {
        let (tx, rx) = mpsc::channel(1);
        let local_addr = acceptor.local_addr();
        let listener = Self {
            acceptor,
            requests: rx,
            logger,
            label,
        };
        let join = tokio::spawn(listener.run(token.clone()));
        ListenerHandle {
            requests: tx,
            pending: None,
            token,
            join,
            local_addr,
        }
    }

    async fn run(mut self, token: CancellationToken) {
        let shown = match self.acceptor.local_addr() {
            Some(addr) => addr.to_string(),
            None => self.label.clone(),
        };
        self.logger.info(format!("listening on {shown}")).await;

        loop {
            let reply = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                req = self.requests.recv() => match req {
                    Some(reply) => reply,
                    None => break,
                },
            };

            let accepted = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                res = self.accept_next() => res,
            };

            match reply.send(accepted) {
                Ok(()) => {}
                Err(Ok(conn)) => {
                    self.logger
                        .warn(format!("listener: no taker for {conn}; closing it"))
                        .await;
                    conn.close().await;
                }
                Err(Err(err)) => {
                    self.logger
                        .warn(format!("listener: accept failed with no taker: {err}"))
                        .await;
                }
            }
        }

        self.logger.info(format!("listener on {shown} stopped")).await;
    }

    async fn accept_next(&mut self) -> io::Result<Connection> {
        loop {
            match self.acceptor.accept().await {
                Ok(conn) => return Ok(conn),
                Err(err) if is_transient(&err) => {
                    self.logger
                        .warn(format!("listener: transient accept error: {err}"))
                        .await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Supervisor-side handle to the listener task.
pub(crate) struct ListenerHandle {
    requests: mpsc::Sender<Reply>,
    pending: Option<oneshot::Receiver<io::Result<Connection>>>,
    token: CancellationToken,
    join: JoinHandle<()>,
    local_addr: Option<SocketAddr>,
}

impl ListenerHandle {
    /// Pulls the next accepted connection.
    ///
    /// Cancel-safe: if the returned future is dropped mid-wait, the outstanding
    /// request is kept and resumed by the next call (or salvaged on shutdown).
    pub(crate) async fn next(&mut self) -> Result<Connection, DispatchFault> {
        if self.pending.is_none() {
            let (tx, rx) = oneshot::channel();
            self.requests
                .send(tx)
                .await
                .map_err(|_| DispatchFault::ListenerGone)?;
            self.pending = Some(rx);
        }
        let Some(rx) = self.pending.as_mut() else {
            return Err(DispatchFault::ListenerGone);
        };
        let res = rx.await;
        self.pending = None;
        match res {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(source)) => Err(DispatchFault::Accept { source }),
            Err(_) => Err(DispatchFault::ListenerGone),
        }
    }

    /// Stops accepting and takes back a connection accepted for an abandoned request.
    pub(crate) fn stop(&mut self) -> Option<Connection> {
        self.token.cancel();
        let mut rx = self.pending.take()?;
        rx.close();
        match rx.try_recv() {
            Ok(Ok(conn)) => Some(conn),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Waits for the listener task to exit. The endpoint is closed once this returns.
    pub(crate) async fn join(self) -> Result<(), tokio::task::JoinError> {
        drop(self.requests);
        self.join.await
    }
}
