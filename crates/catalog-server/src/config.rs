//! Server configuration.

use std::time::Duration;

/// Configuration for the dashboard server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind; `0` picks a free port.
    pub port: u16,
    /// Upper bound on one browser request, remote calls included.
    pub request_timeout: Duration,
    /// Idle time after which a session is dropped.
    pub session_ttl: Duration,
    /// How often expired sessions are swept.
    pub sweep_interval: Duration,
    /// Sessions kept at most; the least recently seen is evicted beyond this.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            request_timeout: Duration::from_secs(45),
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            max_sessions: 1024,
        }
    }
}

impl ServerConfig {
    /// Returns the socket address string (e.g., "127.0.0.1:3001")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
