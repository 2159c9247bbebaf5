//! rtmp-server: RTMP chunk-protocol engine and publish/play server
//!
//! This library provides the server side of RTMP:
//! - Plain handshake (C0C1/S0S1S2/C2)
//! - Chunk stream demultiplexing and message reassembly
//! - AMF0 encoding and decoding
//! - Typed command and control packets, with waiting for specific commands
//! - A connection workflow for Flash/FMLE publishers and players
//!
//! Media payloads are handed to an [`RtmpHandler`] untouched; fan-out,
//! recording and transmuxing belong to the application.
//!
//! # Example: Simple Server
//!
//! ```no_run
//! use rtmp_server::{AuthResult, RtmpHandler, RtmpServer, ServerConfig};
//! use rtmp_server::session::{ConnectParams, PublishParams, SessionContext};
//!
//! struct MyHandler;
//!
//! #[async_trait::async_trait]
//! impl RtmpHandler for MyHandler {
//!     async fn on_connect(&self, _ctx: &SessionContext, _params: &ConnectParams) -> AuthResult {
//!         AuthResult::Accept
//!     }
//!
//!     async fn on_publish(&self, _ctx: &SessionContext, params: &PublishParams) -> AuthResult {
//!         println!("Stream published: {}", params.stream_key);
//!         AuthResult::Accept
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RtmpServer::new(ServerConfig::default(), MyHandler);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod amf;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;

// Re-export main types for convenience
pub use amf::{AmfObject, AmfValue};
pub use error::{Error, Result};
pub use protocol::{Message, Packet, Transport};
pub use server::config::ServerConfig;
pub use server::handler::{AuthResult, LoggingHandler, RtmpHandler};
pub use server::listener::RtmpServer;
