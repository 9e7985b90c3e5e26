//! # Request/response convention.
//!
//! A [`Respond`] implementation turns one question into a [`Response`] triple
//! `(status, headers, body)`. Answer workers validate the triple before replying:
//! the status must be a real status code and headers are always present.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;

/// `(status, headers, body)` produced by a responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Status-only response with empty headers and body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Splits into the plain triple.
    pub fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    /// Checks the response contract.
    ///
    /// # Errors
    /// [`HandlerError::InvalidResponse`] when the status is outside `100..=599`
    /// or a header name is empty.
    pub fn validate(&self) -> Result<(), HandlerError> {
        if !(100..=599).contains(&self.status) {
            return Err(HandlerError::InvalidResponse {
                reason: format!("status {} is not a valid status code", self.status),
            });
        }
        if self.headers.iter().any(|(name, _)| name.is_empty()) {
            return Err(HandlerError::InvalidResponse {
                reason: "header names must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// # Question → response handler used by answer workers.
#[async_trait]
pub trait Respond<Q>: Send + Sync + 'static
where
    Q: Send + 'static,
{
    /// Produces the response for one question.
    async fn respond(&self, question: Q) -> Result<Response, HandlerError>;
}

/// Closure-backed [`Respond`].
///
/// ```rust
/// use connvisor::{RespondFn, Response, HandlerError};
///
/// let hello = RespondFn::arc(|_path: String| async {
///     Ok::<_, HandlerError>(Response::new(200).with_body("Hello, World!"))
/// });
/// # let _ = hello;
/// ```
pub struct RespondFn<Q, F> {
    f: F,
    _question: PhantomData<fn(Q)>,
}

impl<Q, F, Fut> RespondFn<Q, F>
where
    Q: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _question: PhantomData,
        }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<Q, F, Fut> Respond<Q> for RespondFn<Q, F>
where
    Q: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    async fn respond(&self, question: Q) -> Result<Response, HandlerError> {
        (self.f)(question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_out_of_range_status() {
        assert!(Response::new(200).validate().is_ok());
        assert!(Response::new(599).validate().is_ok());
        let err = Response::new(42).validate().unwrap_err();
        assert_eq!(err.as_label(), "handler_invalid_response");
        assert!(Response::new(1000).validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_header_name() {
        let res = Response::new(200).with_header("", "x");
        assert!(res.validate().is_err());
    }

    #[test]
    fn into_parts_keeps_the_triple() {
        let (status, headers, body) = Response::new(201)
            .with_header("content-type", "text/plain")
            .with_body("ok")
            .into_parts();
        assert_eq!(status, 201);
        assert_eq!(headers, vec![("content-type".into(), "text/plain".into())]);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn respond_fn_calls_the_closure() {
        let r = RespondFn::arc(|n: u16| async move { Ok(Response::new(n)) });
        let res = r.respond(204).await.unwrap();
        assert_eq!(res.status, 204);
    }
}
