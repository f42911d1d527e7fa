//! The asynchronous outcome of processing one request.

use crate::error::BoxError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Signals the eventual success or failure of one request's processing.
///
/// A `CompletionSignal` carries no value: it resolves to `Ok(())` once the handler is done, or
/// to the handler's error. The transport uses it to know when the exchange is over and whether
/// it must apply its own recovery.
#[must_use = "a completion signal does nothing unless polled"]
pub struct CompletionSignal {
    inner: BoxFuture<'static, Result<(), BoxError>>,
}

impl CompletionSignal {
    pub fn new<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self { inner: future.map(|result| result.map_err(Into::into)).boxed() }
    }

    /// A signal that is already resolved successfully.
    pub fn completed() -> Self {
        Self { inner: futures::future::ready(Ok(())).boxed() }
    }

    /// A signal that is already resolved with `error`.
    pub fn failed<E: Into<BoxError>>(error: E) -> Self {
        Self { inner: futures::future::ready(Err(error.into())).boxed() }
    }

    /// Attaches observers that run once the signal resolves, without altering its outcome.
    ///
    /// Exactly one of the two callbacks runs, exactly once.
    pub fn observe<S, F>(self, on_success: S, on_failure: F) -> Self
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(&BoxError) + Send + 'static,
    {
        let inner = self.inner;
        Self {
            inner: async move {
                let result = inner.await;
                match &result {
                    Ok(()) => on_success(),
                    Err(e) => on_failure(e),
                }
                result
            }
            .boxed(),
        }
    }
}

impl Future for CompletionSignal {
    type Output = Result<(), BoxError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal").finish_non_exhaustive()
    }
}
