//! The raw response handle given to a [`TransportHandler`](crate::TransportHandler).

use crate::allocator::ConnectionAllocator;
use crate::body::{OutboundBody, TrackedBody};
use crate::error::{BoxError, TransportError};
use bytes::Bytes;
use futures::channel::oneshot;
use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version, header};
use http_body::Body;
use std::fmt;
use tracing::{trace, warn};

/// What the transport receives from a [`RawResponse`].
pub(crate) enum Commit {
    /// The head was committed and the body is ready to be streamed.
    Sent(Response<OutboundBody>),
    /// The response was dropped without being committed.
    Abandoned(Parts),
}

/// One outbound response, bound to the connection that received the request.
///
/// Status and headers stay mutable until the response is committed by [`send`](Self::send) or
/// [`send_headers`](Self::send_headers). Dropping an uncommitted response hands its head back
/// to the transport, which sends it once the request's completion signal resolves.
pub struct RawResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    allocator: ConnectionAllocator,
    commit: Option<oneshot::Sender<Commit>>,
}

impl RawResponse {
    pub(crate) fn new(version: Version, allocator: ConnectionAllocator, commit: oneshot::Sender<Commit>) -> Self {
        Self { status: StatusCode::OK, version, headers: HeaderMap::new(), allocator, commit: Some(commit) }
    }

    /// The allocator of the connection this response will be written to.
    #[inline]
    pub fn alloc(&self) -> &ConnectionAllocator {
        &self.allocator
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), TransportError> {
        if self.has_sent_headers() {
            return Err(TransportError::Committed);
        }
        self.status = status;
        Ok(())
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers, `None` once they have been sent.
    pub fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        if self.has_sent_headers() { None } else { Some(&mut self.headers) }
    }

    #[inline]
    pub fn has_sent_headers(&self) -> bool {
        self.commit.is_none()
    }

    /// Commits the head and an empty body.
    pub fn send_headers(&mut self) -> Result<(), TransportError> {
        self.commit(OutboundBody::empty())
    }

    /// Commits the head and streams `body` to the connection.
    ///
    /// Resolves with the number of body bytes written once the connection has consumed the
    /// whole body, or with an error if the body failed or the connection went away first.
    pub async fn send<B>(&mut self, body: B) -> Result<u64, TransportError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (done_sender, done_receiver) = oneshot::channel();
        let announced = self
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        self.commit(OutboundBody::stream(TrackedBody::new(body, announced, done_sender)))?;
        done_receiver.await.unwrap_or(Err(TransportError::Closed))
    }

    fn commit(&mut self, body: OutboundBody) -> Result<(), TransportError> {
        let sender = self.commit.take().ok_or(TransportError::Committed)?;

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers.clone();

        trace!(status = %self.status, "commit response head");
        sender.send(Commit::Sent(response)).map_err(|_unsent| TransportError::Closed)
    }
}

impl Drop for RawResponse {
    fn drop(&mut self) {
        if let Some(sender) = self.commit.take() {
            let mut parts = Response::new(()).into_parts().0;
            parts.status = self.status;
            parts.version = self.version;
            parts.headers = std::mem::take(&mut self.headers);
            if sender.send(Commit::Abandoned(parts)).is_err() {
                warn!("connection went away before the response head was handed back");
            }
        }
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("connection_id", &self.allocator.connection_id())
            .field("committed", &self.has_sent_headers())
            .finish()
    }
}
