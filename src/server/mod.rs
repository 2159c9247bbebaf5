//! RTMP server implementation
//!
//! This module provides the server-side RTMP implementation:
//! - TCP listener for accepting connections
//! - Per-connection service driving the publish and play workflows
//! - Handler trait for application callbacks

pub mod config;
pub mod connection;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use handler::{AuthResult, LoggingHandler, RtmpHandler};
pub use listener::RtmpServer;
