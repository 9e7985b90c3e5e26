//! # Handler abstractions.
//!
//! The runtime never looks at the bytes on a connection; it only calls into
//! caller-supplied code and observes the result:
//! - [`Handler`]: fire-and-forget connection handling (`&mut Connection` → `()`)
//! - [`HandlerFn`]: closure-backed [`Handler`]
//! - [`Respond`]: the `(status, headers, body)` convention used by the ask bridge
//! - [`RespondFn`]: closure-backed [`Respond`]
//! - [`Response`]: the triple itself

mod handler;
mod handler_fn;
mod respond;

pub use handler::{Handler, HandlerRef};
pub use handler_fn::HandlerFn;
pub use respond::{Respond, RespondFn, Response};
