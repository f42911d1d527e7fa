//! Response decoration for `HEAD` requests.

use crate::body::ResponseBody;
use crate::buffer::BufferFactory;
use crate::error::ResponseError;
use crate::response::ServerHttpResponse;
use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use http_body_util::BodyExt;

/// Answers a `HEAD` request with everything a `GET` would send except the body.
///
/// Status and headers are delegated to the wrapped response. Written bodies are drained and
/// dropped. For a single-chunk body, the chunk length becomes the `content-length` unless the
/// handler set `content-length` or `transfer-encoding` itself. Streamed and empty bodies leave
/// the headers untouched.
#[derive(Debug)]
pub struct HeadResponseDecorator<R> {
    inner: R,
}

impl<R: ServerHttpResponse> HeadResponseDecorator<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: ServerHttpResponse> ServerHttpResponse for HeadResponseDecorator<R> {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) -> bool {
        self.inner.set_status(status)
    }

    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        self.inner.headers_mut()
    }

    fn buffer_factory(&self) -> &BufferFactory {
        self.inner.buffer_factory()
    }

    fn is_committed(&self) -> bool {
        self.inner.is_committed()
    }

    async fn write_with(&mut self, body: ResponseBody) -> Result<(), ResponseError> {
        let single_chunk = body.is_single_chunk();
        let mut body = body;
        let mut length = 0_u64;
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(ResponseError::body)?;
            if let Some(data) = frame.data_ref() {
                length += data.len() as u64;
            }
        }

        if !single_chunk || length == 0 {
            return Ok(());
        }
        if let Some(headers) = self.inner.headers_mut() {
            if !headers.contains_key(header::CONTENT_LENGTH) && !headers.contains_key(header::TRANSFER_ENCODING) {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            }
        }

        Ok(())
    }

    async fn set_complete(&mut self) -> Result<(), ResponseError> {
        self.inner.set_complete().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::TransportResponse;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use http::{Method, Request};
    use http_body::{Body, Frame};
    use http_body_util::{Empty, StreamBody};
    use micro_transport::{CompletionSignal, ConnectionContext, ResponseHandle, exchange};
    use std::io;

    fn head_response() -> (HeadResponseDecorator<TransportResponse>, ResponseHandle) {
        let connection = ConnectionContext::detached();
        let request = Request::builder().method(Method::HEAD).uri("/").body(Empty::<Bytes>::new()).unwrap();
        let (_request, raw, handle) = exchange(request, &connection);
        let factory = BufferFactory::new(raw.alloc().clone());
        (HeadResponseDecorator::new(TransportResponse::new(raw, factory)), handle)
    }

    #[tokio::test]
    async fn explicit_content_length_is_kept_and_body_is_dropped() {
        let (mut response, handle) = head_response();

        response.headers_mut().unwrap().insert(header::CONTENT_LENGTH, HeaderValue::from(42_u64));
        response.write_with(ResponseBody::from("hello")).await.unwrap();
        assert!(!response.is_committed());
        response.set_complete().await.unwrap();

        let resolved = handle.resolve(CompletionSignal::completed()).await;
        assert_eq!(resolved.status(), StatusCode::OK);
        assert_eq!(resolved.headers()[header::CONTENT_LENGTH], "42");
        assert!(resolved.body().is_end_stream());
    }

    #[tokio::test]
    async fn single_chunk_length_becomes_content_length() {
        let (mut response, handle) = head_response();

        response.write_with(ResponseBody::from("hello world")).await.unwrap();

        assert!(response.set_status(StatusCode::CREATED));
        drop(response);

        let resolved = handle.resolve(CompletionSignal::completed()).await;
        assert_eq!(resolved.status(), StatusCode::CREATED);
        assert_eq!(resolved.headers()[header::CONTENT_LENGTH], "11");
        assert!(resolved.body().is_end_stream());
    }

    #[tokio::test]
    async fn streamed_and_empty_bodies_leave_headers_untouched() {
        let (mut response, _handle) = head_response();

        let chunks: Vec<Result<_, io::Error>> = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let body = ResponseBody::stream(StreamBody::new(futures::stream::iter(chunks).map_ok(Frame::data)));
        response.write_with(body).await.unwrap();
        assert!(!response.headers().contains_key(header::CONTENT_LENGTH));

        response.write_with(ResponseBody::empty()).await.unwrap();
        assert!(!response.headers().contains_key(header::CONTENT_LENGTH));
    }

    #[tokio::test]
    async fn chunked_responses_get_no_content_length() {
        let (mut response, _handle) = head_response();

        response.headers_mut().unwrap().insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        response.write_with(ResponseBody::from("hello")).await.unwrap();

        assert!(!response.headers().contains_key(header::CONTENT_LENGTH));
    }

    #[tokio::test]
    async fn failing_body_is_reported() {
        let (mut response, _handle) = head_response();

        let chunks: Vec<Result<Bytes, io::Error>> = vec![Err(io::Error::other("broken body"))];
        let body = ResponseBody::stream(StreamBody::new(futures::stream::iter(chunks).map_ok(Frame::data)));

        let error = response.write_with(body).await.unwrap_err();
        assert!(matches!(error, ResponseError::Body { .. }));
    }
}
