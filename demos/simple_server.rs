//! Simple RTMP server example
//!
//! Run with: cargo run --example simple_server
//!
//! ## Publishing (send stream)
//!
//! With OBS:
//!   Server: rtmp://localhost/live
//!   Stream Key: test_key
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/live/test_key
//!
//! ## Playing
//!
//! With ffplay:
//!   ffplay rtmp://localhost/live/test_key
//!
//! Players are accepted and answered but receive no media: this server
//! does not relay streams between connections.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rtmp_server::protocol::Message;
use rtmp_server::session::{ConnectParams, PlayParams, PublishParams, SessionContext, StreamContext};
use rtmp_server::{AmfValue, AuthResult, RtmpHandler, RtmpServer, ServerConfig};

/// Handler that logs events and counts media
struct MyHandler {
    video_messages: AtomicU64,
    audio_messages: AtomicU64,
    bytes_received: AtomicU64,
}

impl MyHandler {
    fn new() -> Self {
        Self {
            video_messages: AtomicU64::new(0),
            audio_messages: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    fn print_stats(&self) {
        println!(
            "Stats: video={} audio={} bytes={}",
            self.video_messages.load(Ordering::Relaxed),
            self.audio_messages.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        );
    }
}

#[async_trait]
impl RtmpHandler for MyHandler {
    async fn on_connection(&self, ctx: &SessionContext) -> bool {
        println!("[{}] New connection from {}", ctx.session_id, ctx.peer_addr);
        true
    }

    async fn on_connect(&self, ctx: &SessionContext, params: &ConnectParams) -> AuthResult {
        println!(
            "[{}] Connect: app={}, tcUrl={:?}, flashVer={:?}",
            ctx.session_id, params.app, params.tc_url, params.flash_ver
        );
        AuthResult::Accept
    }

    async fn on_publish(&self, ctx: &SessionContext, params: &PublishParams) -> AuthResult {
        println!(
            "[{}] Publish: key={}, type={}, encoder={}",
            ctx.session_id, params.stream_key, params.publish_type, ctx.encoder_type
        );

        // Example: validate stream key
        // if !params.stream_key.starts_with("valid_") {
        //     return AuthResult::Reject("Invalid stream key".into());
        // }

        AuthResult::Accept
    }

    async fn on_play(&self, ctx: &SessionContext, params: &PlayParams) -> AuthResult {
        println!("[{}] Play: {}", ctx.session_id, params.stream_name);
        AuthResult::Accept
    }

    async fn on_metadata(&self, ctx: &StreamContext, metadata: &AmfValue) {
        println!("[{}] Metadata received:", ctx.session.session_id);

        if let (Some(width), Some(height)) =
            (metadata.get_number("width"), metadata.get_number("height"))
        {
            println!("  Resolution: {}x{}", width as u32, height as u32);
        }
        if let Some(fps) = metadata.get_number("framerate") {
            println!("  Framerate: {:.2} fps", fps);
        }
        if let Some(encoder) = metadata.get_string("encoder") {
            println!("  Encoder: {}", encoder);
        }
    }

    async fn on_media(&self, ctx: &StreamContext, message: &Message) {
        self.bytes_received
            .fetch_add(message.size() as u64, Ordering::Relaxed);

        if message.header.is_video() {
            self.video_messages.fetch_add(1, Ordering::Relaxed);
        } else if message.header.is_audio() {
            self.audio_messages.fetch_add(1, Ordering::Relaxed);
        }

        tracing::trace!(
            stream_id = ctx.stream_id,
            message_type = message.message_type(),
            timestamp = message.timestamp(),
            "Server received media",
        );
    }

    async fn on_play_pause(&self, ctx: &StreamContext, paused: bool) {
        println!(
            "[{}] {} {}",
            ctx.session.session_id,
            if paused { "Paused" } else { "Resumed" },
            ctx.stream_key
        );
    }

    async fn on_publish_stop(&self, ctx: &StreamContext) {
        println!(
            "[{}] Publish stopped: {}",
            ctx.session.session_id, ctx.stream_key
        );
        self.print_stats();
    }

    async fn on_play_stop(&self, ctx: &StreamContext) {
        println!("[{}] Play stopped: {}", ctx.session.session_id, ctx.stream_key);
    }

    async fn on_disconnect(&self, ctx: &SessionContext) {
        println!("[{}] Disconnected", ctx.session_id);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtmp_server=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::default();

    println!("Starting RTMP server on {}", config.bind_addr);
    println!();
    println!("=== Publish a stream ===");
    println!("OBS:    Server: rtmp://localhost/live  Stream Key: test");
    println!("ffmpeg: ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/live/test");
    println!();

    let server = RtmpServer::new(config, MyHandler::new());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };
    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
