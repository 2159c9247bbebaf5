//! RTMP session state
//!
//! This module holds what the server learns about a connection:
//! - Connect, publish and play parameters
//! - Context passed to handlers

pub mod context;
pub mod params;

pub use context::{ClientType, SessionContext, StreamContext};
pub use params::{ConnectParams, PlayParams, PublishParams};
