use std::error::Error;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// The boxed error type carried across the handler boundary.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid bind address {address}")]
    InvalidAddress { address: String },

    #[error("response already committed")]
    Committed,

    #[error("connection closed before the response was committed")]
    Closed,

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("connection error: {source}")]
    Connection {
        #[from]
        source: hyper::Error,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("dispose timed out after {timeout:?}")]
    DisposeTimeout { timeout: Duration },
}

impl TransportError {
    pub fn bind<S: ToString>(address: S, source: io::Error) -> Self {
        Self::Bind { address: address.to_string(), source }
    }

    pub fn invalid_address<S: ToString>(address: S) -> Self {
        Self::InvalidAddress { address: address.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}
