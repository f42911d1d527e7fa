//! Bridges the transport's raw request/response pairs to an [`HttpHandler`].

use crate::buffer::BufferFactory;
use crate::handler::HttpHandler;
use crate::head::HeadResponseDecorator;
use crate::request::ServerHttpRequest;
use crate::response::{ServerHttpResponse, TransportResponse};
use http::{Method, StatusCode};
use micro_transport::{CompletionSignal, RawRequest, RawResponse, TransportHandler};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// The [`TransportHandler`] that runs an [`HttpHandler`] for every request the transport decodes.
///
/// For each raw pair the adapter:
///
/// 1. builds a [`BufferFactory`] over the connection allocator
/// 2. builds the [`ServerHttpRequest`], answering `400` without calling the handler if the
///    request target is malformed
/// 3. builds the response, decorated with [`HeadResponseDecorator`] for `HEAD` requests
/// 4. hands both to the handler and returns its outcome as the [`CompletionSignal`]
///
/// The adapter never awaits: it only wires up the handler's future.
pub struct HttpHandlerAdapter<H: ?Sized> {
    handler: Arc<H>,
}

impl<H: HttpHandler + ?Sized> HttpHandlerAdapter<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

impl<H: HttpHandler + ?Sized> TransportHandler for HttpHandlerAdapter<H> {
    fn apply(&self, raw_request: RawRequest, mut raw_response: RawResponse) -> CompletionSignal {
        let buffer_factory = BufferFactory::new(raw_response.alloc().clone());

        let request = match ServerHttpRequest::new(raw_request, buffer_factory.clone()) {
            Ok(request) => request,
            Err(e) => {
                debug!(cause = %e, "failed to get request URI");
                if raw_response.set_status(StatusCode::BAD_REQUEST).is_err() {
                    debug!("response already committed, status 400 not applied");
                }
                return CompletionSignal::completed();
            }
        };

        let response = TransportResponse::new(raw_response, buffer_factory);
        let response: Box<dyn ServerHttpResponse> = if request.method() == Method::HEAD {
            Box::new(HeadResponseDecorator::new(response))
        } else {
            Box::new(response)
        };

        let log_prefix = request.log_prefix();
        let failure_prefix = log_prefix.clone();
        let handler = Arc::clone(&self.handler);

        CompletionSignal::new(async move { handler.handle(request, response).await }).observe(
            move || trace!("{log_prefix}handling completed"),
            move |e| trace!("{failure_prefix}failed to complete: {e}"),
        )
    }
}

impl<H: ?Sized> fmt::Debug for HttpHandlerAdapter<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpHandlerAdapter").finish_non_exhaustive()
    }
}
