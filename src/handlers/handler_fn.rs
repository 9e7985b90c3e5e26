//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure that builds a fresh boxed future per connection.
//! The future borrows the connection, hence the [`BoxFuture`] return type.
//!
//! ## Example
//! ```rust
//! use futures::FutureExt;
//! use tokio::io::AsyncWriteExt;
//! use connvisor::{HandlerFn, HandlerRef, HandlerError};
//!
//! let h: HandlerRef = HandlerFn::arc("hello", |conn, _ctx| {
//!     async move {
//!         conn.stream_mut().write_all(b"Hello, World!\n").await?;
//!         Ok::<_, HandlerError>(())
//!     }
//!     .boxed()
//! });
//!
//! assert_eq!(h.name(), "hello");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::HandlerError;

use super::Handler;

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Connection, CancellationToken) -> BoxFuture<'a, Result<(), HandlerError>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](super::HandlerRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Connection, CancellationToken) -> BoxFuture<'a, Result<(), HandlerError>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        conn: &mut Connection,
        ctx: CancellationToken,
    ) -> Result<(), HandlerError> {
        (self.f)(conn, ctx).await
    }
}
