//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Chunk size announced to clients after connect
    pub chunk_size: u32,

    /// Window acknowledgement size
    pub window_ack_size: u32,

    /// Peer bandwidth limit
    pub peer_bandwidth: u32,

    /// Connection timeout (handshake must complete within this time)
    pub connection_timeout: Duration,

    /// Idle timeout (disconnect if no message arrives)
    pub idle_timeout: Duration,

    /// How long to wait for each command of the connect/publish sequence
    pub expect_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Application-level write buffer size
    pub write_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], RTMP_PORT)),
            max_connections: 0, // Unlimited
            chunk_size: RECOMMENDED_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            peer_bandwidth: DEFAULT_PEER_BANDWIDTH,
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            expect_timeout: Duration::from_secs(2),
            tcp_nodelay: true,
            read_buffer_size: 64 * 1024,
            write_buffer_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set chunk size, clamped to 1..=0x7FFFFFFF
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.window_ack_size = size;
        self
    }

    pub fn peer_bandwidth(mut self, bandwidth: u32) -> Self {
        self.peer_bandwidth = bandwidth;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn expect_timeout(mut self, timeout: Duration) -> Self {
        self.expect_timeout = timeout;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(Error::Config("buffer sizes must be non-zero".into()));
        }
        if self.expect_timeout.is_zero() {
            return Err(Error::Config("expect_timeout must be non-zero".into()));
        }
        if self.window_ack_size == 0 {
            return Err(Error::Config("window_ack_size must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 1935);
        assert_eq!(config.chunk_size, RECOMMENDED_CHUNK_SIZE);
        assert_eq!(config.expect_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let addr: SocketAddr = "127.0.0.1:19350".parse().unwrap();
        let config = ServerConfig::with_addr(addr)
            .max_connections(10)
            .chunk_size(0)
            .expect_timeout(Duration::from_millis(500))
            .idle_timeout(Duration::from_secs(5));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.expect_timeout, Duration::from_millis(500));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ServerConfig::default().expect_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
