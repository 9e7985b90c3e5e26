//! # Run one handler invocation.
//!
//! Both entry points isolate a single invocation: an `Err` is returned as-is and a
//! panic is caught and turned into [`HandlerError::Panicked`]. The caller's task
//! survives either way.
//!
//! ## Rules
//! - Never retries; one call, one invocation.
//! - Never closes the connection; releasing the unit is the worker's job.
//! - [`respond_once`] also enforces the response contract ([`Response::validate`]).

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::{HandlerError, panic_message};
use crate::handlers::{Handler, Respond, Response};

/// Serves `conn` with `handler`, capturing panics.
pub(crate) async fn run_once(
    handler: &dyn Handler,
    conn: &mut Connection,
    ctx: CancellationToken,
) -> Result<(), HandlerError> {
    match AssertUnwindSafe(handler.handle(conn, ctx))
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic) => Err(HandlerError::Panicked {
            info: panic_message(panic.as_ref()),
        }),
    }
}

/// Answers one question with `responder`, capturing panics and validating the result.
pub(crate) async fn respond_once<Q>(
    responder: &dyn Respond<Q>,
    question: Q,
) -> Result<Response, HandlerError>
where
    Q: Send + 'static,
{
    let res = match AssertUnwindSafe(responder.respond(question))
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic) => Err(HandlerError::Panicked {
            info: panic_message(panic.as_ref()),
        }),
    };
    let response = res?;
    response.validate()?;
    Ok(response)
}
