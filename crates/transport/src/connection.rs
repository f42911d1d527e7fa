use std::convert::Infallible;
use std::sync::Arc;

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::body::OutboundBody;
use crate::error::TransportError;
use crate::exchange::{ConnectionContext, exchange};
use crate::handler::TransportHandler;

/// One accepted connection.
///
/// The connection decodes requests, hands every request to the [`TransportHandler`] as a raw
/// request/response pair and writes back whatever the handler commits. Keep-alive and framing
/// are done by hyper.
#[derive(Debug)]
pub struct HttpConnection {
    stream: TcpStream,
    context: ConnectionContext,
    keep_alive: bool,
}

impl HttpConnection {
    pub fn new(stream: TcpStream, context: ConnectionContext, keep_alive: bool) -> Self {
        Self { stream, context, keep_alive }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Serves requests until the peer goes away or `shutdown` is cancelled.
    ///
    /// On shutdown the in-flight request is allowed to finish before the connection closes.
    pub async fn process<H>(self, handler: Arc<H>, shutdown: CancellationToken) -> Result<(), TransportError>
    where
        H: TransportHandler + ?Sized,
    {
        let context = self.context.clone();
        let service = service_fn(move |request: Request<Incoming>| {
            let handler = Arc::clone(&handler);
            let context = context.clone();
            async move { Ok::<_, Infallible>(dispatch(handler.as_ref(), request, &context).await) }
        });

        let connection = http1::Builder::new().keep_alive(self.keep_alive).serve_connection(TokioIo::new(self.stream), service);
        tokio::pin!(connection);

        let result = select! {
            result = connection.as_mut() => result,
            () = shutdown.cancelled() => {
                debug!(connection = %self.context.connection_id(), "shutdown requested, finishing in-flight request");
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        };

        info!(
            connection = %self.context.connection_id(),
            requests = self.context.request_count(),
            "connection closed"
        );
        result.map_err(TransportError::from)
    }
}

async fn dispatch<H>(handler: &H, request: Request<Incoming>, context: &ConnectionContext) -> Response<OutboundBody>
where
    H: TransportHandler + ?Sized,
{
    let (raw_request, raw_response, handle) = exchange(request, context);
    let signal = handler.apply(raw_request, raw_response);
    handle.resolve(signal).await
}
