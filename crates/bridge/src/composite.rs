//! Dispatch to several handlers mounted under distinct context paths.

use crate::error::{HandlerError, InvalidContextPath};
use crate::handler::HttpHandler;
use crate::request::ServerHttpRequest;
use crate::response::ServerHttpResponse;
use async_trait::async_trait;
use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Routes each request to the first handler whose context path matches the request path.
///
/// A context path matches when it equals the path or is followed by `/` in it, so `/api`
/// serves `/api` and `/api/users` but not `/apis`. The matched handler sees the context path
/// through [`ServerHttpRequest::context_path`]. Requests no handler matches get a `404`.
pub struct ContextPathCompositeHandler {
    handlers: Vec<(String, Arc<dyn HttpHandler>)>,
}

impl ContextPathCompositeHandler {
    /// Builds the composite in iteration order. Every context path must start with `/` and must
    /// not end with `/`.
    pub fn new<I, P>(handlers: I) -> Result<Self, InvalidContextPath>
    where
        I: IntoIterator<Item = (P, Arc<dyn HttpHandler>)>,
        P: Into<String>,
    {
        let handlers = handlers
            .into_iter()
            .map(|(path, handler)| {
                let path = path.into();
                validate_context_path(&path)?;
                Ok((path, handler))
            })
            .collect::<Result<Vec<_>, InvalidContextPath>>()?;

        Ok(Self { handlers })
    }

    pub fn context_paths(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(path, _)| path.as_str())
    }

    fn find(&self, path: &str) -> Option<(&str, &Arc<dyn HttpHandler>)> {
        self.handlers
            .iter()
            .find(|(context_path, _)| matches_context_path(path, context_path))
            .map(|(context_path, handler)| (context_path.as_str(), handler))
    }
}

fn validate_context_path(path: &str) -> Result<(), InvalidContextPath> {
    if !path.starts_with('/') {
        return Err(InvalidContextPath::new(path, "context path must start with '/'"));
    }
    if path.ends_with('/') {
        return Err(InvalidContextPath::new(path, "context path must not end with '/'"));
    }
    Ok(())
}

fn matches_context_path(path: &str, context_path: &str) -> bool {
    match path.strip_prefix(context_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[async_trait]
impl HttpHandler for ContextPathCompositeHandler {
    async fn handle(&self, request: ServerHttpRequest, mut response: Box<dyn ServerHttpResponse>) -> Result<(), HandlerError> {
        match self.find(request.path()) {
            Some((context_path, handler)) => {
                let request = request.with_context_path(context_path);
                handler.handle(request, response).await
            }
            None => {
                debug!("{}no handler mounted for {}", request.log_prefix(), request.path());
                response.set_status(StatusCode::NOT_FOUND);
                response.set_complete().await?;
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ContextPathCompositeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPathCompositeHandler").field("context_paths", &self.context_paths().collect::<Vec<_>>()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferFactory;
    use crate::handler::MockHttpHandler;
    use crate::response::TransportResponse;
    use bytes::Bytes;
    use http::Request;
    use http_body::Body;
    use http_body_util::Empty;
    use micro_transport::{CompletionSignal, ConnectionContext, ResponseHandle, exchange};

    fn pair(uri: &str) -> (ServerHttpRequest, Box<dyn ServerHttpResponse>, ResponseHandle) {
        let connection = ConnectionContext::detached();
        let request = Request::builder().uri(uri).body(Empty::<Bytes>::new()).unwrap();
        let (raw_request, raw_response, handle) = exchange(request, &connection);
        let factory = BufferFactory::new(raw_response.alloc().clone());
        let request = ServerHttpRequest::new(raw_request, factory.clone()).unwrap();
        (request, Box::new(TransportResponse::new(raw_response, factory)), handle)
    }

    fn expecting(context_path: &'static str, path_within_application: &'static str) -> Arc<dyn HttpHandler> {
        let mut handler = MockHttpHandler::new();
        handler
            .expect_handle()
            .withf(move |request, _| {
                request.context_path() == context_path && request.path_within_application() == path_within_application
            })
            .times(1)
            .returning(|_, _| Ok(()));
        Arc::new(handler)
    }

    fn never() -> Arc<dyn HttpHandler> {
        let mut handler = MockHttpHandler::new();
        handler.expect_handle().never();
        Arc::new(handler)
    }

    #[test]
    fn context_paths_are_validated() {
        let error = ContextPathCompositeHandler::new([("api", never())]).unwrap_err();
        assert_eq!(error.path(), "api");

        let error = ContextPathCompositeHandler::new([("/api/", never())]).unwrap_err();
        assert_eq!(error.path(), "/api/");

        let composite = ContextPathCompositeHandler::new([("/api", never()), ("/static", never())]).unwrap();
        assert_eq!(composite.context_paths().collect::<Vec<_>>(), ["/api", "/static"]);
    }

    #[test]
    fn matching_stops_at_segment_boundaries() {
        assert!(matches_context_path("/api", "/api"));
        assert!(matches_context_path("/api/users", "/api"));
        assert!(!matches_context_path("/apis", "/api"));
        assert!(!matches_context_path("/", "/api"));
    }

    #[tokio::test]
    async fn dispatches_to_the_first_matching_handler() {
        let composite =
            ContextPathCompositeHandler::new([("/static", never()), ("/api", expecting("/api", "/users")), ("/api/users", never())])
                .unwrap();

        let (request, response, _handle) = pair("/api/users");
        composite.handle(request, response).await.unwrap();
    }

    #[tokio::test]
    async fn unmatched_requests_get_not_found() {
        let composite = ContextPathCompositeHandler::new([("/api", never())]).unwrap();

        let (request, response, handle) = pair("/other");
        composite.handle(request, response).await.unwrap();

        let resolved = handle.resolve(CompletionSignal::completed()).await;
        assert_eq!(resolved.status(), StatusCode::NOT_FOUND);
        assert!(resolved.body().is_end_stream());
    }
}
