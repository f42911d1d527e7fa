//! Pairs a decoded request with its response handle, and turns the handler's outcome back into
//! a response the connection can write.

use crate::allocator::{ConnectionAllocator, ConnectionId};
use crate::body::{OutboundBody, RawBody};
use crate::completion::CompletionSignal;
use crate::error::BoxError;
use crate::request::RawRequest;
use crate::response::{Commit, RawResponse};
use bytes::Bytes;
use futures::channel::oneshot;
use http::{Request, Response, StatusCode};
use http_body::Body;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

/// Per connection state shared by every exchange served on that connection.
#[derive(Clone)]
pub struct ConnectionContext {
    inner: Arc<Inner>,
}

struct Inner {
    allocator: ConnectionAllocator,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    requests: AtomicU64,
}

impl ConnectionContext {
    pub fn new(allocator: ConnectionAllocator, local_addr: Option<SocketAddr>, remote_addr: Option<SocketAddr>) -> Self {
        Self { inner: Arc::new(Inner { allocator, local_addr, remote_addr, requests: AtomicU64::new(0) }) }
    }

    /// A context for a connection without socket addresses, handy for in-memory exchanges.
    pub fn detached() -> Self {
        Self::new(ConnectionAllocator::new(ConnectionId::next()), None, None)
    }

    #[inline]
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.allocator.connection_id()
    }

    #[inline]
    pub fn allocator(&self) -> &ConnectionAllocator {
        &self.inner.allocator
    }

    #[inline]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr
    }

    #[inline]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Number of requests this connection has received so far.
    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    fn next_request_index(&self) -> u64 {
        self.inner.requests.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("connection_id", &self.connection_id())
            .field("local_addr", &self.inner.local_addr)
            .field("remote_addr", &self.inner.remote_addr)
            .field("requests", &self.request_count())
            .finish()
    }
}

/// The transport side of one exchange: waits for the response the handler produces.
#[must_use = "the response handle must be resolved to obtain the response"]
pub struct ResponseHandle {
    commit: oneshot::Receiver<Commit>,
    connection_id: ConnectionId,
}

/// Splits a decoded request into the raw request/response pair handed to a
/// [`TransportHandler`](crate::TransportHandler), plus the handle the transport resolves.
pub fn exchange<B>(request: Request<B>, connection: &ConnectionContext) -> (RawRequest, RawResponse, ResponseHandle)
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = request.into_parts();
    let version = parts.version;
    let (commit_sender, commit_receiver) = oneshot::channel();

    let raw_request = RawRequest::new(
        parts,
        RawBody::new(body),
        connection.connection_id(),
        connection.next_request_index(),
        connection.local_addr(),
        connection.remote_addr(),
    );
    let raw_response = RawResponse::new(version, connection.allocator().clone(), commit_sender);
    let handle = ResponseHandle { commit: commit_receiver, connection_id: connection.connection_id() };

    (raw_request, raw_response, handle)
}

impl ResponseHandle {
    /// Drives `signal` and produces the response to write.
    ///
    /// - once the handler commits, the committed response is returned right away while the
    ///   signal keeps running in the background
    /// - if the handler gives the response up without committing, the head is written with an
    ///   empty body after the signal succeeds
    /// - if the signal fails before anything was committed, a `500` is written instead
    pub async fn resolve(self, signal: CompletionSignal) -> Response<OutboundBody> {
        let connection_id = self.connection_id;
        let completion = tokio::spawn(async move {
            let result = signal.await;
            if let Err(e) = &result {
                warn!(connection = %connection_id, cause = %e, "request handling failed");
            }
            result
        });

        match self.commit.await {
            Ok(Commit::Sent(response)) => response,
            Ok(Commit::Abandoned(parts)) => match completion.await {
                Ok(Ok(())) => Response::from_parts(parts, OutboundBody::empty()),
                Ok(Err(_)) => error_response(StatusCode::INTERNAL_SERVER_ERROR),
                Err(e) => {
                    error!(connection = %connection_id, cause = %e, "request handling panicked");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            Err(_canceled) => {
                error!(connection = %connection_id, "response dropped without reaching the transport");
                error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle").field("connection_id", &self.connection_id).finish_non_exhaustive()
    }
}

fn error_response(status: StatusCode) -> Response<OutboundBody> {
    let mut response = Response::new(OutboundBody::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use http::{Method, header};
    use http_body_util::{BodyExt, Empty, Full};
    use std::io;

    fn get(uri: &str) -> Request<Empty<Bytes>> {
        Request::builder().method(Method::GET).uri(uri).body(Empty::new()).unwrap()
    }

    #[test]
    fn exchange_binds_request_and_response_to_the_connection() {
        let connection = ConnectionContext::detached();

        let (first, first_response, _handle) = exchange(get("/a"), &connection);
        let (second, _, _handle2) = exchange(get("/b?c=d"), &connection);

        assert_eq!(first.connection_id(), connection.connection_id());
        assert_eq!(first.request_index(), 0);
        assert_eq!(second.request_index(), 1);
        assert_eq!(second.target(), "/b?c=d");
        assert!(first_response.alloc().same_as(connection.allocator()));
        assert_eq!(connection.request_count(), 2);
    }

    #[test]
    fn body_is_received_once() {
        let connection = ConnectionContext::detached();
        let (mut request, _response, _handle) = exchange(get("/"), &connection);

        assert!(request.receive().is_some());
        assert!(request.receive().is_none());
    }

    #[tokio::test]
    async fn headers_are_immutable_after_send() {
        let connection = ConnectionContext::detached();
        let (_request, mut response, handle) = exchange(get("/"), &connection);

        response.set_status(StatusCode::CREATED).unwrap();
        response.headers_mut().unwrap().insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());

        let writer = tokio::spawn(async move {
            let written = response.send(Full::new(Bytes::from_static(b"hello"))).await;
            assert!(response.headers_mut().is_none());
            assert!(matches!(response.set_status(StatusCode::OK), Err(TransportError::Committed)));
            written
        });

        let resolved = handle.resolve(CompletionSignal::completed()).await;
        assert_eq!(resolved.status(), StatusCode::CREATED);
        assert_eq!(resolved.headers()[header::CONTENT_TYPE], "text/plain");

        let body = resolved.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"hello"));
        assert_eq!(writer.await.unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn abandoned_response_is_sent_after_completion() {
        let connection = ConnectionContext::detached();
        let (_request, mut response, handle) = exchange(get("/"), &connection);

        response.set_status(StatusCode::NO_CONTENT).unwrap();
        drop(response);

        let resolved = handle.resolve(CompletionSignal::completed()).await;
        assert_eq!(resolved.status(), StatusCode::NO_CONTENT);
        assert!(resolved.body().is_end_stream());
    }

    #[tokio::test]
    async fn failure_before_commit_becomes_internal_server_error() {
        let connection = ConnectionContext::detached();
        let (_request, mut response, handle) = exchange(get("/"), &connection);

        let signal = CompletionSignal::new(async move {
            response.set_status(StatusCode::OK)?;
            drop(response);
            Err::<(), BoxError>(Box::new(io::Error::other("handler failed")))
        });

        let resolved = handle.resolve(signal).await;
        assert_eq!(resolved.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn send_headers_commits_an_empty_body() {
        let connection = ConnectionContext::detached();
        let (_request, mut response, handle) = exchange(get("/"), &connection);

        response.send_headers().unwrap();
        assert!(matches!(response.send_headers(), Err(TransportError::Committed)));

        let resolved = handle.resolve(CompletionSignal::completed()).await;
        assert_eq!(resolved.status(), StatusCode::OK);
        assert!(resolved.body().is_end_stream());
    }
}
