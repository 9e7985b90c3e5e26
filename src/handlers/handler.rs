//! # Connection handler trait.
//!
//! A handler is invoked once per accepted connection by the worker that owns it.
//! It borrows the connection; releasing it is the worker's job.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::HandlerError;

/// # Per-connection handler.
///
/// Any `Err` or panic is caught by the owning worker, logged, and does not affect
/// other connections or the worker itself.
///
/// `ctx` is cancelled when the supervisor shuts down. Standard workers never
/// interrupt a running handler, so observing `ctx` is how a handler opts into
/// a faster drain.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio::io::AsyncWriteExt;
/// use tokio_util::sync::CancellationToken;
/// use connvisor::{Connection, Handler, HandlerError};
///
/// struct Hello;
///
/// #[async_trait]
/// impl Handler for Hello {
///     fn name(&self) -> &str { "hello" }
///
///     async fn handle(&self, conn: &mut Connection, _ctx: CancellationToken) -> Result<(), HandlerError> {
///         conn.stream_mut().write_all(b"Hello, World!\n").await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Human-readable name (for log lines).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Serves one connection.
    async fn handle(&self, conn: &mut Connection, ctx: CancellationToken)
    -> Result<(), HandlerError>;
}

/// Shared handler reference, one clone per worker.
pub type HandlerRef = Arc<dyn Handler>;
