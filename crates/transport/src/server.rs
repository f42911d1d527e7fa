use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, lookup_host};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::allocator::{ConnectionAllocator, ConnectionId, DEFAULT_BUFFER_CAPACITY};
use crate::connection::HttpConnection;
use crate::error::TransportError;
use crate::exchange::ConnectionContext;
use crate::handler::TransportHandler;

/// Configuration of an HTTP server that has not been bound yet.
///
/// ```no_run
/// # async fn run() -> Result<(), micro_transport::TransportError> {
/// use micro_transport::{CompletionSignal, HttpServer, RawRequest, RawResponse};
/// use std::sync::Arc;
///
/// let handler = |_request: RawRequest, _response: RawResponse| CompletionSignal::completed();
///
/// let server = HttpServer::create().host("127.0.0.1").port(0).bind(Arc::new(handler)).await?;
/// println!("listening on {}", server.local_addr());
/// server.dispose(std::time::Duration::from_secs(3)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpServer {
    host: String,
    port: u16,
    keep_alive: bool,
    buffer_capacity: usize,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 0, keep_alive: true, buffer_capacity: DEFAULT_BUFFER_CAPACITY }
    }
}

impl HttpServer {
    pub fn create() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// The port to bind, `0` lets the operating system pick one.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Default capacity of the buffers handed out by each connection's allocator.
    #[must_use]
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn configured_host(&self) -> &str {
        &self.host
    }

    pub fn configured_port(&self) -> u16 {
        self.port
    }

    /// Binds the listener and starts accepting connections on the current runtime.
    ///
    /// Every request received afterwards is handed to `handler`. The returned
    /// [`DisposableServer`] is the only way to stop the server again.
    pub async fn bind<H>(&self, handler: Arc<H>) -> Result<DisposableServer, TransportError>
    where
        H: TransportHandler + ?Sized,
    {
        let address = format!("{}:{}", self.host, self.port);
        let socket_addr = lookup_host(&address)
            .await
            .map_err(|e| TransportError::bind(&address, e))?
            .next()
            .ok_or_else(|| TransportError::invalid_address(&address))?;

        let listener = match TcpListener::bind(socket_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, address = %socket_addr, "bind server error");
                return Err(TransportError::bind(socket_addr, e));
            }
        };
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "start listening");

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let acceptor = Acceptor {
            listener,
            local_addr,
            keep_alive: self.keep_alive,
            buffer_capacity: self.buffer_capacity,
            shutdown: shutdown.clone(),
            tracker: tracker.clone(),
        };
        tracker.spawn(acceptor.run(handler));

        Ok(DisposableServer { local_addr, shutdown, tracker })
    }
}

struct Acceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    keep_alive: bool,
    buffer_capacity: usize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Acceptor {
    async fn run<H>(self, handler: Arc<H>)
    where
        H: TransportHandler + ?Sized,
    {
        loop {
            let (tcp_stream, remote_addr) = select! {
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let allocator = ConnectionAllocator::with_capacity(ConnectionId::next(), self.buffer_capacity);
            let context = ConnectionContext::new(allocator, Some(self.local_addr), Some(remote_addr));
            let connection = HttpConnection::new(tcp_stream, context, self.keep_alive);

            let handler = Arc::clone(&handler);
            let shutdown = self.shutdown.clone();
            self.tracker.spawn(async move {
                let connection_id = connection.context().connection_id();
                if let Err(e) = connection.process(handler, shutdown).await {
                    warn!(connection = %connection_id, cause = %e, "connection error");
                }
            });
        }

        info!(address = %self.local_addr, "stop listening");
    }
}

/// A running server.
///
/// Dropping the handle does not stop the server; call [`dispose`](Self::dispose).
pub struct DisposableServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl DisposableServer {
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops accepting connections, asks open connections to finish their in-flight request
    /// and waits up to `timeout` for all of them to close.
    ///
    /// Disposing twice is harmless.
    pub async fn dispose(&self, timeout: Duration) -> Result<(), TransportError> {
        self.shutdown.cancel();
        self.tracker.close();

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!(address = %self.local_addr, "server disposed");
                Ok(())
            }
            Err(_elapsed) => {
                warn!(address = %self.local_addr, ?timeout, "connections still open after dispose timeout");
                Err(TransportError::DisposeTimeout { timeout })
            }
        }
    }
}

impl fmt::Debug for DisposableServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableServer")
            .field("local_addr", &self.local_addr)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
