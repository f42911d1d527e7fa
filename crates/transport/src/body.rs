//! Body types moving between the connection and the request handler.
//!
//! - [`RawBody`]: the inbound request body, polled lazily by whoever consumes it
//! - [`OutboundBody`]: the response body handed to the connection
//!
//! Both sides implement `http_body::Body`, so bytes only move when the other end polls for
//! them and backpressure flows through naturally.

use crate::error::{BoxError, TransportError};
use bytes::Bytes;
use futures::channel::oneshot;
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// The inbound body of a raw request.
pub struct RawBody {
    inner: UnsyncBoxBody<Bytes, BoxError>,
}

impl RawBody {
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: body.map_err(Into::into).boxed_unsync() }
    }
}

impl Body for RawBody {
    type Data = Bytes;
    type Error = TransportError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => Poll::Ready(Some(Ok(frame))),
            Some(Err(e)) => Poll::Ready(Some(Err(TransportError::invalid_body(format!("failed to read request body: {e}"))))),
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

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBody").field("size_hint", &self.inner.size_hint()).finish()
    }
}

/// The response body written to the connection.
pub struct OutboundBody {
    kind: Kind,
}

enum Kind {
    Empty,
    Stream(UnsyncBoxBody<Bytes, BoxError>),
}

impl OutboundBody {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    pub(crate) fn stream<B>(body: B) -> Self
    where
        B: Body<Data = Bytes, Error = BoxError> + Send + 'static,
    {
        Self { kind: Kind::Stream(body.boxed_unsync()) }
    }
}

impl Body for OutboundBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Stream(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Stream(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Stream(body) => body.size_hint(),
        }
    }
}

impl fmt::Debug for OutboundBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundBody").field("size_hint", &self.size_hint()).finish()
    }
}

pin_project! {
    /// Reports through a oneshot channel once the wrapped body has been fully written,
    /// failed, or was dropped by the connection before it was complete.
    ///
    /// The connection stops polling a body once it has written the announced length, so the
    /// body counts as written as soon as the inner body reports end of stream or the expected
    /// length is reached, without waiting for a trailing `None`.
    pub(crate) struct TrackedBody<B> {
        #[pin]
        inner: B,
        written: u64,
        expected: Option<u64>,
        done: Option<oneshot::Sender<Result<u64, TransportError>>>,
    }

    impl<B> PinnedDrop for TrackedBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(done) = this.done.take() {
                let _ = done.send(Err(TransportError::Closed));
            }
        }
    }
}

impl<B> TrackedBody<B>
where
    B: Body<Data = Bytes>,
{
    /// `expected` is the length announced to the peer, if any; otherwise an exact size hint of
    /// `inner` is used.
    pub(crate) fn new(inner: B, expected: Option<u64>, done: oneshot::Sender<Result<u64, TransportError>>) -> Self {
        let expected = expected.or_else(|| inner.size_hint().exact());
        let mut done = Some(done);
        if inner.is_end_stream() || expected == Some(0) {
            report(&mut done, Ok(0));
        }
        Self { inner, written: 0, expected, done }
    }
}

fn report(done: &mut Option<oneshot::Sender<Result<u64, TransportError>>>, result: Result<u64, TransportError>) {
    if let Some(done) = done.take() {
        let _ = done.send(result);
    }
}

impl<B> Body for TrackedBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    *this.written += data.len() as u64;
                }
                let written = *this.written;
                let reached_expected = this.expected.is_some_and(|expected| written >= expected);
                if reached_expected || this.inner.is_end_stream() {
                    report(this.done, Ok(*this.written));
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                let e: BoxError = e.into();
                report(this.done, Err(TransportError::invalid_body(format!("response body failed: {e}"))));
                Poll::Ready(Some(Err(e)))
            }
            None => {
                report(this.done, Ok(*this.written));
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use http_body_util::{Full, StreamBody};
    use std::io;

    #[tokio::test]
    async fn raw_body_is_lazy_and_finite() {
        let mut body = RawBody::new(Full::new(Bytes::from_static(b"hello")));
        assert_eq!(body.size_hint().exact(), Some(5));

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"hello"));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn raw_body_maps_errors() {
        let chunks: Vec<Result<_, io::Error>> = vec![Ok(Frame::data(Bytes::from_static(b"a"))), Err(io::Error::other("reset"))];
        let mut body = RawBody::new(StreamBody::new(futures::stream::iter(chunks)));

        assert!(body.frame().await.unwrap().is_ok());
        let err = body.frame().await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::InvalidBody { .. }));
    }

    #[tokio::test]
    async fn tracked_body_reports_written_bytes() {
        let (tx, rx) = oneshot::channel();
        let body = TrackedBody::new(Full::new(Bytes::from_static(b"hello world")), None, tx);

        let collected = OutboundBody::stream(body).collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"hello world"));
        assert_eq!(rx.await.unwrap().unwrap(), 11);
    }

    #[tokio::test]
    async fn tracked_body_reports_failure() {
        let chunks: Vec<Result<_, io::Error>> = vec![Ok(Bytes::from_static(b"a")), Err(io::Error::other("broken"))];
        let stream = futures::stream::iter(chunks).map_ok(Frame::data);
        let (tx, rx) = oneshot::channel();
        let body = TrackedBody::new(StreamBody::new(stream), None, tx);

        assert!(OutboundBody::stream(body).collect().await.is_err());
        assert!(matches!(rx.await.unwrap(), Err(TransportError::InvalidBody { .. })));
    }

    #[tokio::test]
    async fn tracked_body_dropped_early_reports_closed() {
        let (tx, rx) = oneshot::channel();
        drop(TrackedBody::new(Full::new(Bytes::from_static(b"unsent")), None, tx));
        assert!(matches!(rx.await.unwrap(), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn tracked_body_is_written_without_polling_past_the_last_frame() {
        let (tx, rx) = oneshot::channel();
        let mut body = TrackedBody::new(Full::new(Bytes::from_static(b"slow")), None, tx);

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"slow"));
        assert!(body.is_end_stream());
        drop(body);

        assert_eq!(rx.await.unwrap().unwrap(), 4);
    }

    #[tokio::test]
    async fn tracked_body_is_written_once_the_announced_length_is_reached() {
        let chunks: Vec<Result<_, io::Error>> = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let stream = futures::stream::iter(chunks).map_ok(Frame::data);
        let (tx, rx) = oneshot::channel();
        let mut body = TrackedBody::new(StreamBody::new(stream), Some(11), tx);

        body.frame().await.unwrap().unwrap();
        body.frame().await.unwrap().unwrap();
        drop(body);

        assert_eq!(rx.await.unwrap().unwrap(), 11);
    }

    #[tokio::test]
    async fn empty_tracked_body_is_written_immediately() {
        let (tx, rx) = oneshot::channel();
        let body = TrackedBody::new(http_body_util::Empty::<Bytes>::new(), None, tx);

        assert_eq!(rx.await.unwrap().unwrap(), 0);
        drop(body);
    }

    #[tokio::test]
    async fn partially_written_tracked_body_reports_closed() {
        let chunks: Vec<Result<_, io::Error>> = vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"world"))];
        let stream = futures::stream::iter(chunks).map_ok(Frame::data);
        let (tx, rx) = oneshot::channel();
        let mut body = TrackedBody::new(StreamBody::new(stream), Some(11), tx);

        body.frame().await.unwrap().unwrap();
        drop(body);

        assert!(matches!(rx.await.unwrap(), Err(TransportError::Closed)));
    }

    #[test]
    fn empty_outbound_body_is_end_stream() {
        let body = OutboundBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }
}
