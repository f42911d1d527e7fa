//! The transport independent response a [`HttpHandler`](crate::HttpHandler) writes to.

use crate::body::ResponseBody;
use crate::buffer::BufferFactory;
use crate::error::ResponseError;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use micro_transport::RawResponse;
use std::fmt;
use tracing::trace;

/// An outbound response whose head can be changed until it is committed.
///
/// The head is committed by the first [`write_with`](Self::write_with) or by
/// [`set_complete`](Self::set_complete). After that, [`set_status`](Self::set_status) returns
/// `false` and [`headers_mut`](Self::headers_mut) returns `None`.
#[async_trait]
pub trait ServerHttpResponse: Send {
    fn status(&self) -> StatusCode;

    /// Returns `false` if the status could not be changed because the response is committed.
    fn set_status(&mut self, status: StatusCode) -> bool;

    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> Option<&mut HeaderMap>;

    fn buffer_factory(&self) -> &BufferFactory;

    fn is_committed(&self) -> bool;

    /// Commits the head and writes `body`, resolving once the connection has taken all of it.
    async fn write_with(&mut self, body: ResponseBody) -> Result<(), ResponseError>;

    /// Commits the head without a body, if it is not committed yet.
    async fn set_complete(&mut self) -> Result<(), ResponseError>;
}

#[async_trait]
impl<R> ServerHttpResponse for Box<R>
where
    R: ServerHttpResponse + ?Sized,
{
    fn status(&self) -> StatusCode {
        (**self).status()
    }

    fn set_status(&mut self, status: StatusCode) -> bool {
        (**self).set_status(status)
    }

    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        (**self).headers_mut()
    }

    fn buffer_factory(&self) -> &BufferFactory {
        (**self).buffer_factory()
    }

    fn is_committed(&self) -> bool {
        (**self).is_committed()
    }

    async fn write_with(&mut self, body: ResponseBody) -> Result<(), ResponseError> {
        (**self).write_with(body).await
    }

    async fn set_complete(&mut self) -> Result<(), ResponseError> {
        (**self).set_complete().await
    }
}

/// [`ServerHttpResponse`] over the transport's [`RawResponse`].
pub struct TransportResponse {
    raw: RawResponse,
    buffer_factory: BufferFactory,
}

impl TransportResponse {
    pub fn new(raw: RawResponse, buffer_factory: BufferFactory) -> Self {
        Self { raw, buffer_factory }
    }
}

#[async_trait]
impl ServerHttpResponse for TransportResponse {
    fn status(&self) -> StatusCode {
        self.raw.status()
    }

    fn set_status(&mut self, status: StatusCode) -> bool {
        self.raw.set_status(status).is_ok()
    }

    fn headers(&self) -> &HeaderMap {
        self.raw.headers()
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        self.raw.headers_mut()
    }

    fn buffer_factory(&self) -> &BufferFactory {
        &self.buffer_factory
    }

    fn is_committed(&self) -> bool {
        self.raw.has_sent_headers()
    }

    async fn write_with(&mut self, body: ResponseBody) -> Result<(), ResponseError> {
        let written = self.raw.send(body).await?;
        trace!(connection = %self.buffer_factory.connection_id(), written, "response body written");
        Ok(())
    }

    async fn set_complete(&mut self) -> Result<(), ResponseError> {
        if !self.raw.has_sent_headers() {
            self.raw.send_headers()?;
        }
        Ok(())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse").field("raw", &self.raw).finish()
    }
}
