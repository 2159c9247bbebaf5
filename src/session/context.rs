//! Handler context
//!
//! Context passed to handler callbacks containing session information.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::protocol::quirks::EncoderType;
use crate::session::params::ConnectParams;

/// Role a client takes after connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    /// Sent `play`
    Player,
    /// Sent `publish` directly after `createStream`
    FlashPublish,
    /// Started with `releaseStream` or `FCPublish`
    FmlePublish,
}

impl ClientType {
    pub fn is_publish(&self) -> bool {
        matches!(self, ClientType::FlashPublish | ClientType::FmlePublish)
    }
}

/// Context passed to RtmpHandler callbacks
///
/// Provides read-only access to session information. For operations
/// that modify state, use the return values from handler methods.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Application name (from connect)
    pub app: String,

    /// Detected encoder type
    pub encoder_type: EncoderType,

    /// Connect parameters (if available)
    pub connect_params: Option<Arc<ConnectParams>>,
}

impl SessionContext {
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            app: String::new(),
            encoder_type: EncoderType::Unknown,
            connect_params: None,
        }
    }

    /// Record the connect parameters and classify the encoder
    pub fn with_connect(&mut self, params: ConnectParams) {
        self.app = params.app.clone();
        self.encoder_type = params
            .flash_ver
            .as_deref()
            .map(EncoderType::from_flash_ver)
            .unwrap_or_default();
        self.connect_params = Some(Arc::new(params));
    }

    pub fn tc_url(&self) -> Option<&str> {
        self.connect_params
            .as_ref()
            .and_then(|p| p.tc_url.as_deref())
    }

    pub fn page_url(&self) -> Option<&str> {
        self.connect_params
            .as_ref()
            .and_then(|p| p.page_url.as_deref())
    }

    pub fn flash_ver(&self) -> Option<&str> {
        self.connect_params
            .as_ref()
            .and_then(|p| p.flash_ver.as_deref())
    }
}

/// Stream context passed to media callbacks
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Parent session context
    pub session: SessionContext,

    /// Message stream ID
    pub stream_id: u32,

    /// Stream key or name
    pub stream_key: String,

    /// Whether this is a publishing or playing stream
    pub is_publishing: bool,
}

impl StreamContext {
    pub fn new(
        session: SessionContext,
        stream_id: u32,
        stream_key: String,
        is_publishing: bool,
    ) -> Self {
        Self {
            session,
            stream_id,
            stream_key,
            is_publishing,
        }
    }
}
