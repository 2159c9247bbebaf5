//! Per-connection RTMP service
//!
//! Drives a single connection through its lifecycle:
//! 1. Handshake
//! 2. Connect command
//! 3. Client identification (player, Flash publisher, FMLE publisher)
//! 4. Publish or play loop
//! 5. Disconnect

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::message::Message;
use crate::protocol::packet::*;
use crate::protocol::transport::Transport;
use crate::server::config::ServerConfig;
use crate::server::handler::{AuthResult, RtmpHandler};
use crate::session::{ClientType, ConnectParams, PlayParams, PublishParams};
use crate::session::{SessionContext, StreamContext};

/// First stream command a client sent after connecting
#[derive(Debug)]
enum Identified {
    Player(PlayPacket),
    FlashPublisher(PublishPacket),
    FmlePublisher(FmleStartPacket),
}

impl Identified {
    fn client_type(&self) -> ClientType {
        match self {
            Identified::Player(_) => ClientType::Player,
            Identified::FlashPublisher(_) => ClientType::FlashPublish,
            Identified::FmlePublisher(_) => ClientType::FmlePublish,
        }
    }
}

/// Per-connection handler
pub struct Connection<S, H: RtmpHandler> {
    transport: Transport<S>,

    /// Session context for callbacks
    context: SessionContext,

    config: ServerConfig,

    handler: Arc<H>,
}

impl<S, H> Connection<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    H: RtmpHandler,
{
    pub fn new(
        session_id: u64,
        stream: S,
        peer_addr: SocketAddr,
        config: ServerConfig,
        handler: Arc<H>,
    ) -> Self {
        let transport =
            Transport::with_capacity(stream, config.read_buffer_size, config.write_buffer_size);

        Self {
            transport,
            context: SessionContext::new(session_id, peer_addr),
            config,
            handler,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Run the connection to completion.
    ///
    /// `on_disconnect` is called for every connection admitted by
    /// `on_connection`, whatever the outcome.
    pub async fn run(&mut self) -> Result<()> {
        if !self.handler.on_connection(&self.context).await {
            return Err(Error::Rejected("Connection rejected by handler".into()));
        }

        let result = self.serve().await;
        self.handler.on_disconnect(&self.context).await;
        result
    }

    async fn serve(&mut self) -> Result<()> {
        timeout(self.config.connection_timeout, self.transport.server_handshake())
            .await
            .map_err(|_| Error::Timeout)??;
        tracing::debug!(session_id = self.context.session_id, "Handshake complete");
        self.handler.on_handshake_complete(&self.context).await;

        self.connect_app().await?;

        let Some(identified) = self.identify_client().await? else {
            return Ok(());
        };
        tracing::debug!(
            session_id = self.context.session_id,
            client_type = ?identified.client_type(),
            "Client identified"
        );

        match identified {
            Identified::Player(play) => self.serve_play(play).await,
            Identified::FlashPublisher(publish) => self.start_publish(publish, false).await,
            Identified::FmlePublisher(start) => self.fmle_publish(start).await,
        }
    }

    /// Handle the connect command and send the connect response
    async fn connect_app(&mut self) -> Result<()> {
        let connect: ConnectAppPacket = self
            .transport
            .expect_packet(self.config.expect_timeout)
            .await?;

        let params = ConnectParams::from_amf(&connect.command_object);
        let transaction_id = connect.transaction_id;
        let object_encoding = params.object_encoding;

        match self.handler.on_connect(&self.context, &params).await {
            AuthResult::Accept => {
                self.context.with_connect(params);

                self.send(
                    SetWindowAckSizePacket {
                        ack_window_size: self.config.window_ack_size,
                    },
                    0,
                )
                .await?;
                self.send(
                    SetPeerBandwidthPacket {
                        bandwidth: self.config.peer_bandwidth,
                        limit_type: BANDWIDTH_LIMIT_DYNAMIC,
                    },
                    0,
                )
                .await?;
                self.send(
                    SetChunkSizePacket {
                        chunk_size: self.config.chunk_size,
                    },
                    0,
                )
                .await?;
                self.send(UserControlEvent::StreamBegin(0), 0).await?;
                self.send(
                    ConnectAppResultPacket::accept(transaction_id, object_encoding),
                    0,
                )
                .await?;

                tracing::info!(
                    session_id = self.context.session_id,
                    app = %self.context.app,
                    encoder = %self.context.encoder_type,
                    "Connected"
                );
                Ok(())
            }
            AuthResult::Reject(reason) => {
                tracing::warn!(
                    session_id = self.context.session_id,
                    app = %params.app,
                    reason = %reason,
                    "Connect rejected"
                );
                self.send(ConnectAppResultPacket::reject(transaction_id, &reason), 0)
                    .await?;
                Err(Error::Rejected(reason))
            }
            AuthResult::Redirect { url } => {
                tracing::info!(
                    session_id = self.context.session_id,
                    url = %url,
                    "Connect redirected"
                );
                self.send(ConnectAppResultPacket::redirect(transaction_id, &url), 0)
                    .await?;
                Err(Error::Rejected(format!("Redirected to {}", url)))
            }
        }
    }

    /// Wait for the command that tells what the client wants to do.
    ///
    /// `createStream` is answered along the way. Returns `None` if the
    /// client leaves or goes idle first.
    async fn identify_client(&mut self) -> Result<Option<Identified>> {
        loop {
            let Some(message) = self.recv_idle().await? else {
                return Ok(None);
            };

            match self.decode(&message)? {
                Some(Packet::CreateStream(p)) => {
                    self.send(
                        CreateStreamResultPacket::new(p.transaction_id, DEFAULT_STREAM_ID),
                        0,
                    )
                    .await?;
                    tracing::debug!(stream_id = DEFAULT_STREAM_ID, "Stream created");
                }
                Some(Packet::Play(p)) => return Ok(Some(Identified::Player(p))),
                Some(Packet::Publish(p)) => return Ok(Some(Identified::FlashPublisher(p))),
                Some(Packet::FmleStart(p)) if p.is_release_stream() || p.is_fc_publish() => {
                    return Ok(Some(Identified::FmlePublisher(p)));
                }
                Some(Packet::UserControl(event)) => self.on_user_control(event).await?,
                other => {
                    tracing::trace!(packet = ?other, "Ignoring packet before identification");
                }
            }
        }
    }

    /// releaseStream, FCPublish, createStream, publish
    async fn fmle_publish(&mut self, mut start: FmleStartPacket) -> Result<()> {
        if start.is_release_stream() {
            self.send(FmleStartResultPacket::new(start.transaction_id), 0)
                .await?;
            start = self.expect_fc_publish().await?;
        }
        self.send(FmleStartResultPacket::new(start.transaction_id), 0)
            .await?;

        let create: CreateStreamPacket = self
            .transport
            .expect_packet(self.config.expect_timeout)
            .await?;
        self.send(
            CreateStreamResultPacket::new(create.transaction_id, DEFAULT_STREAM_ID),
            0,
        )
        .await?;

        let publish: PublishPacket = self
            .transport
            .expect_packet(self.config.expect_timeout)
            .await?;
        self.start_publish(publish, true).await
    }

    async fn expect_fc_publish(&mut self) -> Result<FmleStartPacket> {
        loop {
            let packet: FmleStartPacket = self
                .transport
                .expect_packet(self.config.expect_timeout)
                .await?;
            if packet.is_fc_publish() {
                return Ok(packet);
            }
            tracing::trace!(command = %packet.command_name, "Waiting for FCPublish");
        }
    }

    /// Authorize the publish, start it and run the publish loop
    async fn start_publish(&mut self, publish: PublishPacket, fmle: bool) -> Result<()> {
        let params = PublishParams::from_packet(publish, DEFAULT_STREAM_ID);
        let stream_id = params.stream_id;

        match self.handler.on_publish(&self.context, &params).await {
            AuthResult::Accept => {}
            AuthResult::Reject(reason) | AuthResult::Redirect { url: reason } => {
                tracing::warn!(
                    session_id = self.context.session_id,
                    stream_key = %params.stream_key,
                    reason = %reason,
                    "Publish rejected"
                );
                let status = OnStatusPacket::status(NS_PUBLISH_BAD_NAME, &reason)
                    .with("level", ERROR_LEVEL);
                self.send(status, stream_id).await?;
                return Err(Error::Rejected(reason));
            }
        }

        if fmle {
            let notify = OnStatusPacket::status(NS_PUBLISH_START, "Started publishing stream.")
                .with_command_name(CMD_ON_FC_PUBLISH);
            self.send(notify, stream_id).await?;
        }
        let status = OnStatusPacket::status(NS_PUBLISH_START, "Started publishing stream.")
            .with("clientid", self.context.session_id as f64);
        self.send(status, stream_id).await?;

        tracing::info!(
            session_id = self.context.session_id,
            stream_key = %params.stream_key,
            publish_type = %params.publish_type,
            "Publishing"
        );

        let ctx = StreamContext::new(self.context.clone(), stream_id, params.stream_key, true);
        let result = self.publish_loop(&ctx).await;
        self.handler.on_publish_stop(&ctx).await;
        result
    }

    async fn publish_loop(&mut self, ctx: &StreamContext) -> Result<()> {
        loop {
            let Some(message) = self.recv_idle().await? else {
                return Ok(());
            };

            if message.header.is_media() {
                self.handler.on_media(ctx, &message).await;
                continue;
            }

            match self.decode(&message)? {
                Some(Packet::OnMetaData(p)) => self.handler.on_metadata(ctx, &p.metadata).await,
                Some(Packet::FmleStart(p)) if p.is_fc_unpublish() => {
                    self.unpublish(ctx, p.transaction_id).await?;
                    return Ok(());
                }
                Some(Packet::CloseStream(_)) => {
                    tracing::debug!(stream_key = %ctx.stream_key, "Publisher closed stream");
                    return Ok(());
                }
                Some(Packet::UserControl(event)) => self.on_user_control(event).await?,
                other => {
                    tracing::trace!(packet = ?other, "Ignoring packet while publishing");
                }
            }
        }
    }

    async fn unpublish(&mut self, ctx: &StreamContext, transaction_id: f64) -> Result<()> {
        let notify = OnStatusPacket::status(NS_UNPUBLISH_SUCCESS, "Stop publishing stream.")
            .with_command_name(CMD_ON_FC_UNPUBLISH);
        self.send(notify, ctx.stream_id).await?;
        self.send(FmleStartResultPacket::new(transaction_id), ctx.stream_id)
            .await?;
        let status = OnStatusPacket::status(NS_UNPUBLISH_SUCCESS, "Stream is now unpublished.");
        self.send(status, ctx.stream_id).await?;

        tracing::info!(
            session_id = self.context.session_id,
            stream_key = %ctx.stream_key,
            "Unpublished"
        );
        Ok(())
    }

    /// Authorize the play, start it and run the play loop
    async fn serve_play(&mut self, play: PlayPacket) -> Result<()> {
        let params = PlayParams::from_packet(play, DEFAULT_STREAM_ID);
        let stream_id = params.stream_id;

        match self.handler.on_play(&self.context, &params).await {
            AuthResult::Accept => {}
            AuthResult::Reject(reason) | AuthResult::Redirect { url: reason } => {
                tracing::warn!(
                    session_id = self.context.session_id,
                    stream_name = %params.stream_name,
                    reason = %reason,
                    "Play rejected"
                );
                let status =
                    OnStatusPacket::status(NS_PLAY_FAILED, &reason).with("level", ERROR_LEVEL);
                self.send(status, stream_id).await?;
                return Err(Error::Rejected(reason));
            }
        }

        self.send(UserControlEvent::StreamBegin(stream_id), 0)
            .await?;
        if params.reset {
            let reset = OnStatusPacket::status(NS_PLAY_RESET, "Playing and resetting stream.")
                .with("details", params.stream_name.as_str());
            self.send(reset, stream_id).await?;
        }
        let start = OnStatusPacket::status(NS_PLAY_START, "Started playing stream.")
            .with("details", params.stream_name.as_str());
        self.send(start, stream_id).await?;
        self.send(
            SampleAccessPacket {
                video_sample_access: false,
                audio_sample_access: false,
            },
            stream_id,
        )
        .await?;

        tracing::info!(
            session_id = self.context.session_id,
            stream_name = %params.stream_name,
            "Playing"
        );

        let ctx = StreamContext::new(self.context.clone(), stream_id, params.stream_name, false);
        let result = self.play_loop(&ctx).await;
        self.handler.on_play_stop(&ctx).await;
        result
    }

    async fn play_loop(&mut self, ctx: &StreamContext) -> Result<()> {
        loop {
            let Some(message) = self.recv_idle().await? else {
                return Ok(());
            };

            match self.decode(&message)? {
                Some(Packet::Pause(p)) => {
                    let status = if p.is_pause {
                        OnStatusPacket::status(NS_PAUSE_NOTIFY, "Paused stream.")
                    } else {
                        OnStatusPacket::status(NS_UNPAUSE_NOTIFY, "Unpaused stream.")
                    };
                    self.send(status, ctx.stream_id).await?;
                    self.handler.on_play_pause(ctx, p.is_pause).await;
                }
                Some(Packet::CloseStream(_)) => {
                    tracing::debug!(stream_name = %ctx.stream_key, "Player closed stream");
                    return Ok(());
                }
                Some(Packet::UserControl(event)) => self.on_user_control(event).await?,
                other => {
                    tracing::trace!(packet = ?other, "Ignoring packet while playing");
                }
            }
        }
    }

    async fn on_user_control(&mut self, event: UserControlEvent) -> Result<()> {
        match event {
            UserControlEvent::PingRequest(timestamp) => {
                self.send(UserControlEvent::PingResponse(timestamp), 0)
                    .await
            }
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            } => {
                tracing::trace!(stream_id, buffer_ms, "Client buffer length");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Receive the next message, or `None` once the peer closes or idles out
    async fn recv_idle(&mut self) -> Result<Option<Message>> {
        match timeout(self.config.idle_timeout, self.transport.recv_message()).await {
            Ok(Ok(message)) => Ok(Some(message)),
            Ok(Err(Error::ConnectionClosed)) => Ok(None),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::debug!(session_id = self.context.session_id, "Idle timeout");
                Ok(None)
            }
        }
    }

    /// Decode a packet, dropping messages whose AMF payload is malformed
    fn decode(&self, message: &Message) -> Result<Option<Packet>> {
        match Packet::decode(message) {
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    session_id = self.context.session_id,
                    message_type = message.message_type(),
                    error = %e,
                    "Dropping undecodable message"
                );
                Ok(None)
            }
            result => result,
        }
    }

    async fn send(&mut self, packet: impl Into<Packet>, stream_id: u32) -> Result<()> {
        self.transport.send_packet(&packet.into(), stream_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::{Amf0Decoder, AmfObject, AmfValue};
    use crate::protocol::handshake::{C0C1_SIZE, C2_SIZE, S0S1S2_SIZE};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Records every callback
    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<String>>,
        reject_connect: bool,
        reject_publish: bool,
    }

    impl RecordingHandler {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RtmpHandler for RecordingHandler {
        async fn on_handshake_complete(&self, _ctx: &SessionContext) {
            self.push("handshake");
        }

        async fn on_connect(&self, _ctx: &SessionContext, params: &ConnectParams) -> AuthResult {
            self.push(format!("connect:{}", params.app));
            if self.reject_connect {
                AuthResult::Reject("go away".into())
            } else {
                AuthResult::Accept
            }
        }

        async fn on_publish(&self, ctx: &SessionContext, params: &PublishParams) -> AuthResult {
            self.push(format!("publish:{}:{}", params.stream_key, ctx.app));
            if self.reject_publish {
                AuthResult::Reject("bad key".into())
            } else {
                AuthResult::Accept
            }
        }

        async fn on_play(&self, _ctx: &SessionContext, params: &PlayParams) -> AuthResult {
            self.push(format!("play:{}", params.stream_name));
            AuthResult::Accept
        }

        async fn on_metadata(&self, _ctx: &StreamContext, metadata: &AmfValue) {
            let width = metadata.get_number("width").unwrap_or_default();
            self.push(format!("metadata:{}", width));
        }

        async fn on_media(&self, _ctx: &StreamContext, message: &Message) {
            self.push(format!(
                "media:{}:{}:{}",
                message.message_type(),
                message.timestamp(),
                message.size()
            ));
        }

        async fn on_play_pause(&self, _ctx: &StreamContext, paused: bool) {
            self.push(format!("pause:{}", paused));
        }

        async fn on_publish_stop(&self, ctx: &StreamContext) {
            self.push(format!("publish_stop:{}", ctx.stream_key));
        }

        async fn on_play_stop(&self, ctx: &StreamContext) {
            self.push(format!("play_stop:{}", ctx.stream_key));
        }

        async fn on_disconnect(&self, _ctx: &SessionContext) {
            self.push("disconnect");
        }
    }

    fn test_config() -> ServerConfig {
        ServerConfig::default()
            .expect_timeout(Duration::from_secs(2))
            .idle_timeout(Duration::from_secs(5))
    }

    fn spawn_connection(
        handler: Arc<RecordingHandler>,
        config: ServerConfig,
    ) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = duplex(256 * 1024);
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let task = tokio::spawn(async move {
            let mut connection = Connection::new(7, server, peer, config, handler);
            connection.run().await
        });
        (client, task)
    }

    /// Plain client handshake, then a message transport on the same stream
    async fn client_handshake(mut io: DuplexStream) -> Transport<DuplexStream> {
        let mut c0c1 = [0x42u8; C0C1_SIZE];
        c0c1[0] = RTMP_VERSION;
        io.write_all(&c0c1).await.unwrap();

        let mut s0s1s2 = vec![0u8; S0S1S2_SIZE];
        io.read_exact(&mut s0s1s2).await.unwrap();
        assert_eq!(s0s1s2[0], RTMP_VERSION);
        assert_eq!(&s0s1s2[1 + C2_SIZE..], &c0c1[1..]);

        io.write_all(&s0s1s2[1..1 + C2_SIZE]).await.unwrap();
        Transport::new(io)
    }

    async fn send(client: &mut Transport<DuplexStream>, packet: impl Into<Packet>, sid: u32) {
        client.send_packet(&packet.into(), sid).await.unwrap();
    }

    async fn recv<T: crate::protocol::ExpectedPacket>(client: &mut Transport<DuplexStream>) -> T {
        client.expect_packet(Duration::from_secs(2)).await.unwrap()
    }

    /// Next command or data message, split into its name and arguments
    async fn recv_command(client: &mut Transport<DuplexStream>) -> (String, Bytes) {
        loop {
            let message = timeout(Duration::from_secs(2), client.recv_message())
                .await
                .unwrap()
                .unwrap();
            if message.header.is_command_or_data() {
                let mut payload = message.payload.clone();
                let name = Amf0Decoder::new().expect_string(&mut payload).unwrap();
                return (name, payload);
            }
        }
    }

    async fn recv_status(client: &mut Transport<DuplexStream>) -> OnStatusPacket {
        let (name, mut payload) = recv_command(client).await;
        OnStatusPacket::decode(&name, &mut payload).unwrap()
    }

    async fn recv_result(client: &mut Transport<DuplexStream>) -> Bytes {
        let (name, payload) = recv_command(client).await;
        assert_eq!(name, CMD_RESULT);
        payload
    }

    async fn connect(client: &mut Transport<DuplexStream>) -> ConnectAppResultPacket {
        let command_object = AmfObject::new()
            .with("app", "live")
            .with("flashVer", "FMLE/3.0 (compatible; FMSc/1.0)")
            .with("tcUrl", "rtmp://localhost/live")
            .with("objectEncoding", 0.0);
        send(client, ConnectAppPacket::new(command_object), 0).await;

        let (name, mut payload) = recv_command(client).await;
        ConnectAppResultPacket::decode(&name, &mut payload).unwrap()
    }

    #[tokio::test]
    async fn test_connect_sends_control_sequence() {
        let handler = Arc::new(RecordingHandler::default());
        let (io, task) = spawn_connection(handler.clone(), test_config());
        let mut client = client_handshake(io).await;

        let command_object = AmfObject::new().with("app", "live");
        send(&mut client, ConnectAppPacket::new(command_object), 0).await;

        let mut packets = Vec::new();
        while packets.len() < 4 {
            let (_, packet) = client.recv_packet().await.unwrap();
            packets.extend(packet);
        }

        assert!(matches!(
            packets[0],
            Packet::SetWindowAckSize(SetWindowAckSizePacket {
                ack_window_size: DEFAULT_WINDOW_ACK_SIZE
            })
        ));
        assert!(matches!(
            packets[1],
            Packet::SetPeerBandwidth(SetPeerBandwidthPacket {
                limit_type: BANDWIDTH_LIMIT_DYNAMIC,
                ..
            })
        ));
        assert!(matches!(
            packets[2],
            Packet::SetChunkSize(SetChunkSizePacket {
                chunk_size: RECOMMENDED_CHUNK_SIZE
            })
        ));
        assert_eq!(packets[3], Packet::UserControl(UserControlEvent::StreamBegin(0)));
        assert_eq!(client.in_chunk_size(), RECOMMENDED_CHUNK_SIZE);

        let mut payload = recv_result(&mut client).await;
        let response = ConnectAppResultPacket::decode(CMD_RESULT, &mut payload).unwrap();
        assert_eq!(response.transaction_id, 1.0);
        assert_eq!(
            response.props.get("fmsVer").and_then(AmfValue::as_str),
            Some("FMS/3,5,3,888")
        );

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(handler.events(), vec!["handshake", "connect:live", "disconnect"]);
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let handler = Arc::new(RecordingHandler {
            reject_connect: true,
            ..Default::default()
        });
        let (io, task) = spawn_connection(handler.clone(), test_config());
        let mut client = client_handshake(io).await;

        let response = connect(&mut client).await;
        assert!(response.is_error());
        assert_eq!(
            response.info.get("code").and_then(AmfValue::as_str),
            Some(NC_CONNECT_REJECTED)
        );

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Rejected(reason) if reason == "go away"));
        assert_eq!(handler.events().last().map(String::as_str), Some("disconnect"));
    }

    #[tokio::test]
    async fn test_fmle_publish_flow() {
        let handler = Arc::new(RecordingHandler::default());
        let (io, task) = spawn_connection(handler.clone(), test_config());
        let mut client = client_handshake(io).await;

        let response = connect(&mut client).await;
        assert!(!response.is_error());
        assert_eq!(
            response.info.get("code").and_then(AmfValue::as_str),
            Some(NC_CONNECT_SUCCESS)
        );

        send(&mut client, FmleStartPacket::new(CMD_RELEASE_STREAM, 2.0, "key"), 0).await;
        let mut payload = recv_result(&mut client).await;
        let result = FmleStartResultPacket::decode(&mut payload).unwrap();
        assert_eq!(result.transaction_id, 2.0);

        send(&mut client, FmleStartPacket::new(CMD_FC_PUBLISH, 3.0, "key"), 0).await;
        let mut payload = recv_result(&mut client).await;
        let result = FmleStartResultPacket::decode(&mut payload).unwrap();
        assert_eq!(result.transaction_id, 3.0);

        send(&mut client, CreateStreamPacket::new(4.0), 0).await;
        let mut payload = recv_result(&mut client).await;
        let created = CreateStreamResultPacket::decode(&mut payload).unwrap();
        assert_eq!(created.transaction_id, 4.0);
        assert_eq!(created.stream_id, DEFAULT_STREAM_ID as f64);

        let mut publish = PublishPacket::new("key");
        publish.transaction_id = 5.0;
        send(&mut client, publish, DEFAULT_STREAM_ID).await;

        let notify = recv_status(&mut client).await;
        assert_eq!(notify.command_name, CMD_ON_FC_PUBLISH);
        let status = recv_status(&mut client).await;
        assert_eq!(status.command_name, CMD_ON_STATUS);
        assert_eq!(status.code(), Some(NS_PUBLISH_START));

        let metadata = AmfValue::Object(AmfObject::new().with("width", 1280.0));
        let mut data = OnMetaDataPacket::new(metadata);
        data.name = CMD_SET_DATA_FRAME.to_string();
        send(&mut client, data, DEFAULT_STREAM_ID).await;

        let video = Message::new(
            MSG_VIDEO,
            40,
            CID_VIDEO,
            Bytes::from_static(&[0x17, 0x01, 0, 0, 0, 0xAA]),
        );
        client.send_message(video, DEFAULT_STREAM_ID).await.unwrap();

        send(&mut client, FmleStartPacket::new(CMD_FC_UNPUBLISH, 6.0, "key"), 0).await;
        let notify = recv_status(&mut client).await;
        assert_eq!(notify.command_name, CMD_ON_FC_UNPUBLISH);
        let mut payload = recv_result(&mut client).await;
        let result = FmleStartResultPacket::decode(&mut payload).unwrap();
        assert_eq!(result.transaction_id, 6.0);
        let status = recv_status(&mut client).await;
        assert_eq!(status.code(), Some(NS_UNPUBLISH_SUCCESS));

        task.await.unwrap().unwrap();
        assert_eq!(
            handler.events(),
            vec![
                "handshake",
                "connect:live",
                "publish:key:live",
                "metadata:1280",
                "media:9:40:6",
                "publish_stop:key",
                "disconnect",
            ]
        );
    }

    #[tokio::test]
    async fn test_flash_publish_rejected() {
        let handler = Arc::new(RecordingHandler {
            reject_publish: true,
            ..Default::default()
        });
        let (io, task) = spawn_connection(handler.clone(), test_config());
        let mut client = client_handshake(io).await;
        connect(&mut client).await;

        send(&mut client, CreateStreamPacket::new(2.0), 0).await;
        let mut payload = recv_result(&mut client).await;
        let created = CreateStreamResultPacket::decode(&mut payload).unwrap();
        assert_eq!(created.transaction_id, 2.0);

        send(&mut client, PublishPacket::new("nope"), DEFAULT_STREAM_ID).await;
        let status = recv_status(&mut client).await;
        assert_eq!(status.code(), Some(NS_PUBLISH_BAD_NAME));
        assert_eq!(
            status.data.get("level").and_then(AmfValue::as_str),
            Some(ERROR_LEVEL)
        );

        assert!(matches!(task.await.unwrap(), Err(Error::Rejected(_))));
        assert!(!handler.events().iter().any(|e| e.starts_with("publish_stop")));
    }

    #[tokio::test]
    async fn test_play_flow_with_pause() {
        let handler = Arc::new(RecordingHandler::default());
        let (io, task) = spawn_connection(handler.clone(), test_config());
        let mut client = client_handshake(io).await;
        connect(&mut client).await;

        send(&mut client, CreateStreamPacket::new(2.0), 0).await;
        recv_result(&mut client).await;

        send(&mut client, PlayPacket::new("cam1"), DEFAULT_STREAM_ID).await;
        let begin: UserControlEvent = recv(&mut client).await;
        assert_eq!(begin, UserControlEvent::StreamBegin(DEFAULT_STREAM_ID));
        let reset = recv_status(&mut client).await;
        assert_eq!(reset.code(), Some(NS_PLAY_RESET));
        let start = recv_status(&mut client).await;
        assert_eq!(start.code(), Some(NS_PLAY_START));
        assert_eq!(
            start.data.get("details").and_then(AmfValue::as_str),
            Some("cam1")
        );

        let (name, mut payload) = recv_command(&mut client).await;
        assert_eq!(name, CMD_SAMPLE_ACCESS);
        let access = SampleAccessPacket::decode(&mut payload).unwrap();
        assert!(!access.video_sample_access);

        send(
            &mut client,
            PausePacket {
                transaction_id: 0.0,
                is_pause: true,
                time_ms: 1000.0,
            },
            DEFAULT_STREAM_ID,
        )
        .await;
        let paused = recv_status(&mut client).await;
        assert_eq!(paused.code(), Some(NS_PAUSE_NOTIFY));

        send(&mut client, UserControlEvent::PingRequest(99), 0).await;
        let pong: UserControlEvent = recv(&mut client).await;
        assert_eq!(pong, UserControlEvent::PingResponse(99));

        send(&mut client, CloseStreamPacket { transaction_id: 0.0 }, DEFAULT_STREAM_ID).await;
        task.await.unwrap().unwrap();

        assert_eq!(
            handler.events(),
            vec![
                "handshake",
                "connect:live",
                "play:cam1",
                "pause:true",
                "play_stop:cam1",
                "disconnect",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_connect_times_out() {
        let handler = Arc::new(RecordingHandler::default());
        let config = test_config().expect_timeout(Duration::from_millis(100));
        let (io, task) = spawn_connection(handler.clone(), config);
        let _client = client_handshake(io).await;

        assert!(matches!(task.await.unwrap(), Err(Error::Timeout)));
        assert_eq!(handler.events(), vec!["handshake", "disconnect"]);
    }
}
