use crate::error::HandlerError;
use crate::request::ServerHttpRequest;
use crate::response::ServerHttpResponse;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Application code answering requests independently of the transport that carries them.
///
/// The handler owns the response for the duration of the call. Returning `Ok` without having
/// written anything sends whatever head was set with an empty body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpHandler: Send + Sync + 'static {
    async fn handle(&self, request: ServerHttpRequest, response: Box<dyn ServerHttpResponse>) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H> HttpHandler for Arc<H>
where
    H: HttpHandler + ?Sized,
{
    async fn handle(&self, request: ServerHttpRequest, response: Box<dyn ServerHttpResponse>) -> Result<(), HandlerError> {
        (**self).handle(request, response).await
    }
}

/// An async function used as an [`HttpHandler`], see [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, Err> HttpHandler for FnHandler<F>
where
    F: Fn(ServerHttpRequest, Box<dyn ServerHttpResponse>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Err>> + Send + 'static,
    Err: Into<HandlerError> + 'static,
{
    async fn handle(&self, request: ServerHttpRequest, response: Box<dyn ServerHttpResponse>) -> Result<(), HandlerError> {
        (self.f)(request, response).await.map_err(Into::into)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Turns an async function into an [`HttpHandler`].
///
/// ```
/// use micro_bridge::{HandlerError, ServerHttpRequest, ServerHttpResponse, handler_fn};
///
/// let handler = handler_fn(|request: ServerHttpRequest, mut response: Box<dyn ServerHttpResponse>| async move {
///     let body = format!("hello {}", request.path());
///     response.write_with(body.into()).await?;
///     Ok::<_, HandlerError>(())
/// });
/// ```
pub fn handler_fn<F, Fut, Err>(f: F) -> FnHandler<F>
where
    F: Fn(ServerHttpRequest, Box<dyn ServerHttpResponse>) -> Fut,
    Fut: Future<Output = Result<(), Err>>,
    Err: Into<HandlerError>,
{
    FnHandler { f }
}
