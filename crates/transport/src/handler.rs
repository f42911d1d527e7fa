use crate::completion::CompletionSignal;
use crate::request::RawRequest;
use crate::response::RawResponse;

/// The per request callback the transport invokes.
///
/// Called exactly once for every decoded request, on whichever worker serves the connection.
/// Implementations must not block: they wire up the work and return a [`CompletionSignal`]
/// describing when the exchange is over.
pub trait TransportHandler: Send + Sync + 'static {
    fn apply(&self, request: RawRequest, response: RawResponse) -> CompletionSignal;
}

impl<F> TransportHandler for F
where
    F: Fn(RawRequest, RawResponse) -> CompletionSignal + Send + Sync + 'static,
{
    fn apply(&self, request: RawRequest, response: RawResponse) -> CompletionSignal {
        (self)(request, response)
    }
}
