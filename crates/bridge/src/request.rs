//! The transport independent request handed to an [`HttpHandler`](crate::HttpHandler).

use crate::buffer::BufferFactory;
use crate::error::MalformedRequestTarget;
use crate::uri::resolve_request_uri;
use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use http_body::{Body, Frame, SizeHint};
use micro_transport::{RawBody, RawRequest, TransportError};
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// An HTTP request decoupled from the transport that received it.
///
/// The body is exposed as a lazy [`RequestBody`] that can be taken once; nothing is read from
/// the connection until it is polled.
pub struct ServerHttpRequest {
    id: String,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    context_path: String,
    body: Option<RequestBody>,
    buffer_factory: BufferFactory,
}

impl ServerHttpRequest {
    /// Wraps `raw`, failing if its target can't be parsed into a structured URI.
    pub fn new(mut raw: RawRequest, buffer_factory: BufferFactory) -> Result<Self, MalformedRequestTarget> {
        let uri = resolve_request_uri(&raw)?;
        let body = raw.receive().map(|body| RequestBody::new(body, buffer_factory.clone()));

        Ok(Self {
            id: format!("{}-{}", raw.connection_id(), raw.request_index()),
            method: raw.method().clone(),
            uri,
            version: raw.version(),
            headers: raw.headers().clone(),
            local_addr: raw.local_addr(),
            remote_addr: raw.remote_addr(),
            context_path: String::new(),
            body,
            buffer_factory,
        })
    }

    /// Identifies the request in logs: the connection id and the request's position on it.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Prefix for log messages about this request, e.g. `"[0000002a-3] "`.
    pub fn log_prefix(&self) -> String {
        format!("[{}] ", self.id)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The part of the path the application is mounted at, empty by default.
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// The path with the context path stripped.
    pub fn path_within_application(&self) -> &str {
        &self.path()[self.context_path.len()..]
    }

    /// Mounts the request under `context_path`, which must be a prefix of the path.
    pub(crate) fn with_context_path(mut self, context_path: &str) -> Self {
        debug_assert!(self.path().starts_with(context_path));
        self.context_path = context_path.to_string();
        self
    }

    pub fn buffer_factory(&self) -> &BufferFactory {
        &self.buffer_factory
    }

    /// Takes the body. Returns `None` once it has been taken.
    pub fn body(&mut self) -> Option<RequestBody> {
        self.body.take()
    }
}

impl fmt::Debug for ServerHttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHttpRequest")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("context_path", &self.context_path)
            .finish_non_exhaustive()
    }
}

/// The inbound body of a [`ServerHttpRequest`].
///
/// Chunks are pulled from the connection only when polled, and each one is wrapped by the
/// request's [`BufferFactory`] without copying. The body is finite and can't be restarted.
pub struct RequestBody {
    inner: RawBody,
    buffer_factory: BufferFactory,
}

impl RequestBody {
    fn new(inner: RawBody, buffer_factory: BufferFactory) -> Self {
        Self { inner, buffer_factory }
    }
}

impl Body for RequestBody {
    type Data = Bytes;
    type Error = TransportError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                let frame = frame.map_data(|bytes| this.buffer_factory.wrap(bytes));
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody")
            .field("connection_id", &self.buffer_factory.connection_id())
            .field("size_hint", &self.inner.size_hint())
            .finish()
    }
}
