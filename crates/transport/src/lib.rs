//! An embedded asynchronous HTTP/1.1 transport.
//!
//! This crate is the network side of micro-bridge: it owns sockets, HTTP framing and
//! keep-alive (delegated to hyper), and hands every decoded request to a
//! [`TransportHandler`] as a pair of raw handles:
//!
//! - [`RawRequest`]: method, raw request target, headers, connection metadata and a lazily
//!   polled [`RawBody`]
//! - [`RawResponse`]: mutable status and headers until committed, a body sink, and the
//!   connection scoped [`ConnectionAllocator`]
//!
//! The handler answers with a [`CompletionSignal`], which tells the transport when the exchange
//! is over and whether it failed.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use micro_transport::{CompletionSignal, HttpServer, RawRequest, RawResponse};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), micro_transport::TransportError> {
//!     let handler = |request: RawRequest, mut response: RawResponse| {
//!         let body = format!("you asked for {}\r\n", request.target());
//!         CompletionSignal::new(async move { response.send(Full::new(Bytes::from(body))).await.map(|_| ()) })
//!     };
//!
//!     let server = HttpServer::create().host("127.0.0.1").port(8080).bind(Arc::new(handler)).await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.dispose(Duration::from_secs(3)).await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`server`]: binding, the accept loop and [`DisposableServer`]
//! - [`connection`]: serving one accepted connection
//! - [`exchange`]: pairing requests with responses and resolving the handler's outcome
//! - [`allocator`]: connection scoped buffer allocation
//! - [`body`]: inbound and outbound body types

pub mod allocator;
pub mod body;
pub mod connection;
pub mod exchange;
pub mod server;

mod completion;
mod error;
mod handler;
mod request;
mod response;

pub use allocator::{AllocatorStats, ConnectionAllocator, ConnectionId};
pub use body::{OutboundBody, RawBody};
pub use completion::CompletionSignal;
pub use error::{BoxError, TransportError};
pub use exchange::{ConnectionContext, ResponseHandle, exchange};
pub use handler::TransportHandler;
pub use request::RawRequest;
pub use response::RawResponse;
pub use server::{DisposableServer, HttpServer};
