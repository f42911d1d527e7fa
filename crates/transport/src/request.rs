//! The raw request handle given to a [`TransportHandler`](crate::TransportHandler).

use crate::allocator::ConnectionId;
use crate::body::RawBody;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use std::net::SocketAddr;

/// One inbound request as decoded by the connection.
///
/// The request target is kept exactly as the connection received it; turning it into a
/// structured URI is left to the handler. The body can be taken once.
#[derive(Debug)]
pub struct RawRequest {
    parts: Parts,
    body: Option<RawBody>,
    connection_id: ConnectionId,
    request_index: u64,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
}

impl RawRequest {
    pub(crate) fn new(
        parts: Parts,
        body: RawBody,
        connection_id: ConnectionId,
        request_index: u64,
        local_addr: Option<SocketAddr>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self { parts, body: Some(body), connection_id, request_index, local_addr, remote_addr }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// The request target as sent on the request line, e.g. `/index.html?a=1`.
    pub fn target(&self) -> String {
        self.parts.uri.to_string()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.parts.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    #[inline]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Zero based position of this request among the requests of its connection.
    #[inline]
    pub fn request_index(&self) -> u64 {
        self.request_index
    }

    #[inline]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    #[inline]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Takes the inbound body. Returns `None` once it has been taken.
    pub fn receive(&mut self) -> Option<RawBody> {
        self.body.take()
    }
}
