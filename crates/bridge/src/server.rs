//! Lifecycle of an embedded server instance.

use crate::adapter::HttpHandlerAdapter;
use crate::composite::ContextPathCompositeHandler;
use crate::config::ServerConfig;
use crate::error::LifecycleError;
use crate::handler::HttpHandler;
use arc_swap::ArcSwapOption;
use micro_transport::{DisposableServer, HttpServer};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::runtime::Runtime;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    Uninitialized = 0,
    Initialized = 1,
    Started = 2,
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initialized,
            2 => Self::Started,
            3 => Self::Stopped,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

enum HandlerSource {
    Single(Arc<dyn HttpHandler>),
    ContextPaths(Vec<(String, Arc<dyn HttpHandler>)>),
}

impl HandlerSource {
    fn resolve(&self) -> Result<Arc<dyn HttpHandler>, LifecycleError> {
        match self {
            Self::Single(handler) => Ok(Arc::clone(handler)),
            Self::ContextPaths(handlers) => {
                let composite = ContextPathCompositeHandler::new(
                    handlers.iter().map(|(path, handler)| (path.clone(), Arc::clone(handler))),
                )?;
                Ok(Arc::new(composite))
            }
        }
    }
}

/// An embedded HTTP server for test and host harnesses.
///
/// The server runs on a tokio runtime it owns. [`start`](Self::start), [`stop`](Self::stop) and
/// [`reset`](Self::reset) block the calling thread, so they must not be called from inside an
/// async context.
///
/// ```text
/// Uninitialized --init--> Initialized --start--> Started --stop--> Stopped --start--> Started
///       ^                                                                       |
///       +---------------------------------- reset (from any state) ------------+
/// ```
///
/// [`stop`](Self::stop) takes `&self` and may race with requests in flight and with other
/// `stop` calls: exactly one caller disposes the running server.
pub struct EmbeddedServer {
    config: ServerConfig,
    handler_source: Option<HandlerSource>,
    state: StateCell,
    runtime: Option<Runtime>,
    http_server: Option<HttpServer>,
    adapter: Option<Arc<HttpHandlerAdapter<dyn HttpHandler>>>,
    server_ref: ArcSwapOption<DisposableServer>,
}

impl Default for EmbeddedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            handler_source: None,
            state: StateCell::new(LifecycleState::Uninitialized),
            runtime: None,
            http_server: None,
            adapter: None,
            server_ref: ArcSwapOption::empty(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn host(&self) -> &str {
        self.config.host()
    }

    /// Takes effect on the next [`init`](Self::init).
    pub fn set_host<S: Into<String>>(&mut self, host: S) {
        self.config.set_host(host.into());
    }

    /// The bound port while started, the requested port otherwise.
    pub fn port(&self) -> u16 {
        self.bound_port().unwrap_or_else(|| self.config.port())
    }

    /// Takes effect on the next [`init`](Self::init). `0` binds an ephemeral port.
    pub fn set_port(&mut self, port: u16) {
        self.config.set_port(port);
    }

    /// The port the running server is bound to, `None` unless started.
    pub fn bound_port(&self) -> Option<u16> {
        self.server_ref.load_full().map(|server| server.port())
    }

    /// Serves every request with `handler`, replacing any handler or handler map set before.
    pub fn set_handler<H: HttpHandler>(&mut self, handler: H) {
        self.handler_source = Some(HandlerSource::Single(Arc::new(handler)));
    }

    /// Serves requests with the handler mounted under the first matching context path, see
    /// [`ContextPathCompositeHandler`]. Replaces any handler set before.
    pub fn set_handler_map<I, P>(&mut self, handlers: I)
    where
        I: IntoIterator<Item = (P, Arc<dyn HttpHandler>)>,
        P: Into<String>,
    {
        let handlers = handlers.into_iter().map(|(path, handler)| (path.into(), handler)).collect();
        self.handler_source = Some(HandlerSource::ContextPaths(handlers));
    }

    /// Prepares the runtime, the adapter and the server configuration, without binding.
    pub fn init(&mut self) -> Result<(), LifecycleError> {
        let state = self.state();
        if state != LifecycleState::Uninitialized {
            return Err(LifecycleError::invalid_state("init", state));
        }

        let handler = self.handler_source.as_ref().ok_or(LifecycleError::MissingHandler)?.resolve()?;

        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(worker_threads) = self.config.worker_threads() {
            builder.worker_threads(worker_threads);
        }
        let runtime =
            builder.thread_name("micro-bridge-worker").enable_all().build().map_err(|source| LifecycleError::Runtime { source })?;

        self.http_server = Some(HttpServer::create().host(self.config.host()).port(self.config.port()));
        self.adapter = Some(Arc::new(HttpHandlerAdapter::new(handler)));
        self.runtime = Some(runtime);
        self.state.set(LifecycleState::Initialized);
        Ok(())
    }

    /// Binds and starts the server, blocking until the bind completes or times out.
    ///
    /// Starting a started server does nothing. A failed bind leaves the state unchanged.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        let state = self.state();
        match state {
            LifecycleState::Started => return Ok(()),
            LifecycleState::Initialized | LifecycleState::Stopped => {}
            LifecycleState::Uninitialized => return Err(LifecycleError::invalid_state("start", state)),
        }

        let (Some(runtime), Some(http_server), Some(adapter)) = (&self.runtime, &self.http_server, &self.adapter) else {
            return Err(LifecycleError::invalid_state("start", state));
        };

        let bind_timeout = self.config.bind_timeout();
        let address = format!("{}:{}", http_server.configured_host(), http_server.configured_port());
        let handler = Arc::clone(adapter);
        let bound = runtime.block_on(async { tokio::time::timeout(bind_timeout, http_server.bind(handler)).await });

        let server = match bound {
            Ok(Ok(server)) => server,
            Ok(Err(e)) => return Err(e.into()),
            Err(_elapsed) => return Err(LifecycleError::BindTimeout { address, timeout: bind_timeout }),
        };

        info!(address = %server.local_addr(), "embedded server started");
        self.server_ref.store(Some(Arc::new(server)));
        self.state.set(LifecycleState::Started);
        Ok(())
    }

    /// Stops the running server, blocking until its connections are closed or the shutdown
    /// timeout elapses. Does nothing unless started.
    ///
    /// The server is detached before it is disposed, so a disposal error is reported with the
    /// state already `Stopped`.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        let Some(server) = self.server_ref.swap(None) else {
            return Ok(());
        };
        self.state.set(LifecycleState::Stopped);

        let Some(runtime) = &self.runtime else {
            return Ok(());
        };

        info!(address = %server.local_addr(), "stopping embedded server");
        runtime.block_on(server.dispose(self.config.shutdown_timeout())).map_err(|source| LifecycleError::Dispose { source })
    }

    /// Returns to `Uninitialized` from any state, disposing the running server best-effort.
    ///
    /// Host, port and handler are kept, so the server can be initialized again.
    pub fn reset(&mut self) {
        if let Err(e) = self.stop() {
            warn!(cause = %e, "failed to stop embedded server during reset");
        }

        self.adapter = None;
        self.http_server = None;
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(self.config.shutdown_timeout());
        }
        self.state.set(LifecycleState::Uninitialized);
    }
}

impl Drop for EmbeddedServer {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            self.reset();
        }
    }
}

impl fmt::Debug for EmbeddedServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedServer")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("bound_port", &self.bound_port())
            .finish_non_exhaustive()
    }
}
