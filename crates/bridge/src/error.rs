use crate::server::LifecycleState;
use micro_transport::TransportError;
use std::error::Error;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// The error a [`HttpHandler`](crate::HttpHandler) fails with.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// The raw request target could not be turned into a structured URI.
#[derive(Debug, Error)]
#[error("malformed request target {target:?}: {reason}")]
pub struct MalformedRequestTarget {
    target: String,
    reason: String,
}

impl MalformedRequestTarget {
    pub fn new<T: ToString, R: ToString>(target: T, reason: R) -> Self {
        Self { target: target.to_string(), reason: reason.to_string() }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A context path given to a [`ContextPathCompositeHandler`](crate::ContextPathCompositeHandler)
/// was rejected.
#[derive(Debug, Error)]
#[error("invalid context path {path:?}: {reason}")]
pub struct InvalidContextPath {
    path: String,
    reason: &'static str,
}

impl InvalidContextPath {
    pub(crate) fn new<P: ToString>(path: P, reason: &'static str) -> Self {
        Self { path: path.to_string(), reason }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    #[error("invalid body: {reason}")]
    Body { reason: String },
}

impl ResponseError {
    pub fn body<S: ToString>(str: S) -> Self {
        Self::Body { reason: str.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("an http handler must be set before init")]
    MissingHandler,

    #[error("handler map rejected: {source}")]
    HandlerMap {
        #[from]
        source: InvalidContextPath,
    },

    #[error("can't {operation} while {state}")]
    InvalidState { operation: &'static str, state: LifecycleState },

    #[error("failed to create runtime: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },

    #[error("bind error: {source}")]
    Bind {
        #[from]
        source: TransportError,
    },

    #[error("bind to {address} timed out after {timeout:?}")]
    BindTimeout { address: String, timeout: Duration },

    #[error("dispose error: {source}")]
    Dispose {
        #[source]
        source: TransportError,
    },
}

impl LifecycleError {
    pub fn invalid_state(operation: &'static str, state: LifecycleState) -> Self {
        Self::InvalidState { operation, state }
    }
}
