use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Settings of an [`EmbeddedServer`](crate::EmbeddedServer).
///
/// ```
/// use micro_bridge::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::builder().host("127.0.0.1").port(8080).shutdown_timeout(Duration::from_secs(1)).build();
/// assert_eq!(config.host(), "127.0.0.1");
/// assert_eq!(config.bind_timeout(), Duration::from_secs(45));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    worker_threads: Option<usize>,
    bind_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            worker_threads: None,
            bind_timeout: DEFAULT_BIND_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The requested port, `0` for an ephemeral one.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Worker threads of the server runtime, `None` for tokio's default.
    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    pub fn bind_timeout(&self) -> Duration {
        self.bind_timeout
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub(crate) fn set_host(&mut self, host: String) {
        self.host = host;
    }

    pub(crate) fn set_port(&mut self, port: u16) {
        self.port = port;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.config.worker_threads = Some(worker_threads);
        self
    }

    /// How long [`EmbeddedServer::start`](crate::EmbeddedServer::start) waits for the bind.
    #[must_use]
    pub fn bind_timeout(mut self, bind_timeout: Duration) -> Self {
        self.config.bind_timeout = bind_timeout;
        self
    }

    /// How long stopping waits for open connections to finish.
    #[must_use]
    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.config.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
