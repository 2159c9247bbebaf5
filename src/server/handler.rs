//! RTMP handler trait
//!
//! The main extension point for RTMP applications. Implement this trait
//! to handle connection events, authentication, and media data.

use async_trait::async_trait;

use crate::amf::AmfValue;
use crate::protocol::message::Message;
use crate::session::{ConnectParams, PlayParams, PublishParams, SessionContext, StreamContext};

/// Result of authentication/authorization checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Accept the request
    Accept,

    /// Reject the request with a reason
    Reject(String),

    /// Redirect to another URL
    Redirect { url: String },
}

impl AuthResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, AuthResult::Accept)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, AuthResult::Reject(_))
    }
}

/// Handler trait for RTMP applications
///
/// Implement this trait to customize RTMP server behavior. All methods
/// have default implementations that accept/allow everything.
///
/// # Example
///
/// ```ignore
/// use rtmp_server::{AuthResult, RtmpHandler};
/// use rtmp_server::session::{ConnectParams, PublishParams, SessionContext};
///
/// struct MyHandler;
///
/// #[async_trait::async_trait]
/// impl RtmpHandler for MyHandler {
///     async fn on_connect(&self, ctx: &SessionContext, params: &ConnectParams) -> AuthResult {
///         if params.app == "live" {
///             AuthResult::Accept
///         } else {
///             AuthResult::Reject("Unknown application".into())
///         }
///     }
///
///     async fn on_publish(&self, ctx: &SessionContext, params: &PublishParams) -> AuthResult {
///         if params.stream_key.starts_with("valid_") {
///             AuthResult::Accept
///         } else {
///             AuthResult::Reject("Invalid stream key".into())
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RtmpHandler: Send + Sync + 'static {
    /// Called when a new TCP connection is established
    ///
    /// Return false to immediately close the connection.
    async fn on_connection(&self, _ctx: &SessionContext) -> bool {
        true
    }

    /// Called after successful handshake, before connect command
    async fn on_handshake_complete(&self, _ctx: &SessionContext) {}

    /// Called on RTMP 'connect' command
    ///
    /// Validate the application name, auth tokens in tcUrl, etc.
    async fn on_connect(&self, _ctx: &SessionContext, _params: &ConnectParams) -> AuthResult {
        AuthResult::Accept
    }

    /// Called on 'publish' command
    ///
    /// This is the main authentication point for publishers. A redirect
    /// is treated as a rejection.
    async fn on_publish(&self, _ctx: &SessionContext, _params: &PublishParams) -> AuthResult {
        AuthResult::Accept
    }

    /// Called on 'play' command
    async fn on_play(&self, _ctx: &SessionContext, _params: &PlayParams) -> AuthResult {
        AuthResult::Accept
    }

    /// Called when stream metadata is received (@setDataFrame/onMetaData)
    async fn on_metadata(&self, _ctx: &StreamContext, _metadata: &AmfValue) {}

    /// Called for each audio, video or aggregate message from a publisher
    async fn on_media(&self, _ctx: &StreamContext, _message: &Message) {}

    /// Called when a player pauses (true) or resumes (false)
    async fn on_play_pause(&self, _ctx: &StreamContext, _paused: bool) {}

    /// Called when the publish stream ends
    async fn on_publish_stop(&self, _ctx: &StreamContext) {}

    /// Called when the play stream ends
    async fn on_play_stop(&self, _ctx: &StreamContext) {}

    /// Called when the connection closes
    async fn on_disconnect(&self, _ctx: &SessionContext) {}
}

/// A simple handler that accepts all connections and logs events
pub struct LoggingHandler;

#[async_trait]
impl RtmpHandler for LoggingHandler {
    async fn on_connection(&self, ctx: &SessionContext) -> bool {
        tracing::info!(
            session_id = ctx.session_id,
            peer = %ctx.peer_addr,
            "New connection"
        );
        true
    }

    async fn on_connect(&self, ctx: &SessionContext, params: &ConnectParams) -> AuthResult {
        tracing::info!(
            session_id = ctx.session_id,
            app = %params.app,
            "Connect request"
        );
        AuthResult::Accept
    }

    async fn on_publish(&self, ctx: &SessionContext, params: &PublishParams) -> AuthResult {
        tracing::info!(
            session_id = ctx.session_id,
            stream_key = %params.stream_key,
            encoder = %ctx.encoder_type,
            "Publish request"
        );
        AuthResult::Accept
    }

    async fn on_play(&self, ctx: &SessionContext, params: &PlayParams) -> AuthResult {
        tracing::info!(
            session_id = ctx.session_id,
            stream_name = %params.stream_name,
            "Play request"
        );
        AuthResult::Accept
    }

    async fn on_metadata(&self, ctx: &StreamContext, metadata: &AmfValue) {
        tracing::debug!(
            session_id = ctx.session.session_id,
            stream_key = %ctx.stream_key,
            keys = ?metadata.as_object().map(|o| o.keys().collect::<Vec<_>>()),
            "Received metadata"
        );
    }

    async fn on_media(&self, ctx: &StreamContext, message: &Message) {
        tracing::trace!(
            session_id = ctx.session.session_id,
            message_type = message.message_type(),
            timestamp = message.timestamp(),
            size = message.size(),
            "Media message"
        );
    }

    async fn on_disconnect(&self, ctx: &SessionContext) {
        tracing::info!(session_id = ctx.session_id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_result() {
        assert!(AuthResult::Accept.is_accept());
        assert!(AuthResult::Reject("no".into()).is_reject());
        let redirect = AuthResult::Redirect {
            url: "rtmp://other/live".into(),
        };
        assert!(!redirect.is_accept());
        assert!(!redirect.is_reject());
    }
}
