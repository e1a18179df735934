//! HTTP listener settings

use std::net::SocketAddr;

/// Default port of the frame server
pub const DEFAULT_PORT: u16 = 8000;

/// Listener settings for [`FramecastServer`](super::FramecastServer)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address for HTTP and WebSocket traffic
    pub bind_addr: SocketAddr,

    /// Cap on simultaneous `/ws` subscribers (0 = no cap)
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0,
        }
    }
}

impl ServerConfig {
    /// Defaults, listening on `addr`
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self::default().bind(addr)
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Limit concurrent subscribers; extra upgrades get 503
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.max_connections = limit;
        self
    }

    /// Whether subscriber connections are capped
    pub fn is_limited(&self) -> bool {
        self.max_connections > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_listen_everywhere() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
        assert!(!config.is_limited());
    }

    #[test]
    fn test_with_addr_keeps_other_defaults() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 0);
    }

    #[test]
    fn test_subscriber_cap() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::default().bind(addr).max_connections(16);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 16);
        assert!(config.is_limited());
    }
}
