//! Bridges micro-transport's raw exchanges to a transport independent [`HttpHandler`].
//!
//! Two pieces live here:
//!
//! - [`HttpHandlerAdapter`]: the [`TransportHandler`](micro_transport::TransportHandler) the
//!   network server calls for every request. It turns the raw pair into a
//!   [`ServerHttpRequest`] and a [`ServerHttpResponse`], answers malformed request targets with
//!   `400`, strips bodies from `HEAD` responses and reports the handler's outcome as a
//!   [`CompletionSignal`](micro_transport::CompletionSignal).
//! - [`EmbeddedServer`]: boots, binds, stops and resets an embedded server around a handler.
//!
//! # Example
//!
//! ```no_run
//! use micro_bridge::{EmbeddedServer, HandlerError, ServerHttpRequest, ServerHttpResponse, handler_fn};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = EmbeddedServer::new();
//!     server.set_host("127.0.0.1");
//!     server.set_handler(handler_fn(|request: ServerHttpRequest, mut response: Box<dyn ServerHttpResponse>| async move {
//!         response.write_with(format!("{} {}", request.method(), request.path()).into()).await?;
//!         Ok::<_, HandlerError>(())
//!     }));
//!
//!     server.init()?;
//!     server.start()?;
//!     println!("listening on {}", server.port());
//!
//!     server.stop()?;
//!     server.reset();
//!     Ok(())
//! }
//! ```

mod adapter;
mod body;
mod buffer;
mod composite;
mod config;
mod error;
mod handler;
mod head;
mod request;
mod response;
mod server;
mod uri;

pub use adapter::HttpHandlerAdapter;
pub use body::ResponseBody;
pub use buffer::BufferFactory;
pub use composite::ContextPathCompositeHandler;
pub use config::{DEFAULT_BIND_TIMEOUT, DEFAULT_HOST, DEFAULT_SHUTDOWN_TIMEOUT, ServerConfig, ServerConfigBuilder};
pub use error::{HandlerError, InvalidContextPath, LifecycleError, MalformedRequestTarget, ResponseError};
pub use handler::{FnHandler, HttpHandler, handler_fn};
pub use head::HeadResponseDecorator;
pub use request::{RequestBody, ServerHttpRequest};
pub use response::{ServerHttpResponse, TransportResponse};
pub use server::{EmbeddedServer, LifecycleState};
