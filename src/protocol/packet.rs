//! RTMP command and control packets
//!
//! Every packet type knows its message type id and the chunk stream it is
//! sent over, and can be decoded from or encoded to a message payload.
//! [`Packet::decode`] selects the variant: control messages by message type,
//! command and data messages by their leading AMF0 command name.
//!
//! Reference: RTMP Specification Sections 5.4 and 7

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::amf::{Amf0Decoder, Amf0Encoder, AmfObject, AmfValue};
use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;
use crate::protocol::message::Message;

/// Server version reported in connect responses
const FMS_VERSION: &str = "FMS/3,5,3,888";

/// All packet types understood by the server
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    ConnectApp(ConnectAppPacket),
    ConnectAppResult(ConnectAppResultPacket),
    CreateStream(CreateStreamPacket),
    CreateStreamResult(CreateStreamResultPacket),
    Publish(PublishPacket),
    Play(PlayPacket),
    Pause(PausePacket),
    FmleStart(FmleStartPacket),
    FmleStartResult(FmleStartResultPacket),
    OnStatus(OnStatusPacket),
    OnMetaData(OnMetaDataPacket),
    SampleAccess(SampleAccessPacket),
    SetChunkSize(SetChunkSizePacket),
    SetPeerBandwidth(SetPeerBandwidthPacket),
    SetWindowAckSize(SetWindowAckSizePacket),
    Acknowledgement(AcknowledgementPacket),
    UserControl(UserControlEvent),
    CloseStream(CloseStreamPacket),
}

/// Decoder for the arguments following a command name
type CommandDecoder = fn(&str, &mut Bytes) -> Result<Packet>;

/// Command name table
fn command_decoder(name: &str) -> Option<CommandDecoder> {
    let decoder: CommandDecoder = match name {
        CMD_CONNECT => |_, p| ConnectAppPacket::decode(p).map(Packet::ConnectApp),
        CMD_PLAY => |_, p| PlayPacket::decode(p).map(Packet::Play),
        CMD_PAUSE => |_, p| PausePacket::decode(p).map(Packet::Pause),
        CMD_RELEASE_STREAM | CMD_FC_PUBLISH | CMD_FC_UNPUBLISH => {
            |name, p| FmleStartPacket::decode(name, p).map(Packet::FmleStart)
        }
        CMD_CREATE_STREAM => |_, p| CreateStreamPacket::decode(p).map(Packet::CreateStream),
        CMD_PUBLISH => |_, p| PublishPacket::decode(p).map(Packet::Publish),
        CMD_CLOSE_STREAM => |_, p| CloseStreamPacket::decode(p).map(Packet::CloseStream),
        CMD_SET_DATA_FRAME | CMD_ON_METADATA => {
            |name, p| OnMetaDataPacket::decode(name, p).map(Packet::OnMetaData)
        }
        _ => return None,
    };
    Some(decoder)
}

impl Packet {
    /// Decode the packet carried by `message`.
    ///
    /// Returns `Ok(None)` for media, unknown message types and unknown
    /// command names.
    pub fn decode(message: &Message) -> Result<Option<Packet>> {
        let header = &message.header;
        let mut payload = message.payload.clone();

        if header.is_command_or_data() {
            if header.is_amf3_command() && payload.has_remaining() {
                payload.advance(1);
            }

            let name = Amf0Decoder::new().expect_string(&mut payload)?;
            return match command_decoder(&name) {
                Some(decode) => decode(&name, &mut payload).map(Some),
                None => {
                    tracing::trace!(command = %name, "Ignoring unknown command");
                    Ok(None)
                }
            };
        }

        let packet = match header.message_type {
            MSG_SET_CHUNK_SIZE => Packet::SetChunkSize(SetChunkSizePacket::decode(&mut payload)?),
            MSG_ACKNOWLEDGEMENT => {
                Packet::Acknowledgement(AcknowledgementPacket::decode(&mut payload)?)
            }
            MSG_USER_CONTROL => Packet::UserControl(UserControlEvent::decode(&mut payload)?),
            MSG_WINDOW_ACK_SIZE => {
                Packet::SetWindowAckSize(SetWindowAckSizePacket::decode(&mut payload)?)
            }
            MSG_SET_PEER_BANDWIDTH => {
                Packet::SetPeerBandwidth(SetPeerBandwidthPacket::decode(&mut payload)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(packet))
    }

    /// RTMP message type id this packet is sent as
    pub fn message_type(&self) -> u8 {
        match self {
            Packet::OnMetaData(_) | Packet::SampleAccess(_) => MSG_DATA_AMF0,
            Packet::SetChunkSize(_) => MSG_SET_CHUNK_SIZE,
            Packet::SetPeerBandwidth(_) => MSG_SET_PEER_BANDWIDTH,
            Packet::SetWindowAckSize(_) => MSG_WINDOW_ACK_SIZE,
            Packet::Acknowledgement(_) => MSG_ACKNOWLEDGEMENT,
            Packet::UserControl(_) => MSG_USER_CONTROL,
            _ => MSG_COMMAND_AMF0,
        }
    }

    /// Chunk stream this packet is sent over
    pub fn preferred_cid(&self) -> u32 {
        match self {
            Packet::ConnectApp(_)
            | Packet::ConnectAppResult(_)
            | Packet::CreateStream(_)
            | Packet::CreateStreamResult(_)
            | Packet::FmleStart(_)
            | Packet::FmleStartResult(_) => CID_OVER_CONNECTION,
            Packet::Publish(_)
            | Packet::Play(_)
            | Packet::Pause(_)
            | Packet::OnStatus(_)
            | Packet::SampleAccess(_)
            | Packet::CloseStream(_) => CID_OVER_STREAM,
            Packet::OnMetaData(_) => CID_OVER_CONNECTION2,
            Packet::SetChunkSize(_)
            | Packet::SetPeerBandwidth(_)
            | Packet::SetWindowAckSize(_)
            | Packet::Acknowledgement(_)
            | Packet::UserControl(_) => CID_PROTOCOL_CONTROL,
        }
    }

    /// Encode the message payload
    pub fn encode(&self) -> Bytes {
        match self {
            Packet::ConnectApp(p) => p.encode(),
            Packet::ConnectAppResult(p) => p.encode(),
            Packet::CreateStream(p) => p.encode(),
            Packet::CreateStreamResult(p) => p.encode(),
            Packet::Publish(p) => p.encode(),
            Packet::Play(p) => p.encode(),
            Packet::Pause(p) => p.encode(),
            Packet::FmleStart(p) => p.encode(),
            Packet::FmleStartResult(p) => p.encode(),
            Packet::OnStatus(p) => p.encode(),
            Packet::OnMetaData(p) => p.encode(),
            Packet::SampleAccess(p) => p.encode(),
            Packet::SetChunkSize(p) => p.encode(),
            Packet::SetPeerBandwidth(p) => p.encode(),
            Packet::SetWindowAckSize(p) => p.encode(),
            Packet::Acknowledgement(p) => p.encode(),
            Packet::UserControl(e) => e.encode(),
            Packet::CloseStream(p) => p.encode(),
        }
    }

    /// Build the message that carries this packet on `stream_id`
    pub fn to_message(&self, stream_id: u32) -> Message {
        let mut message = Message::new(self.message_type(), 0, self.preferred_cid(), self.encode());
        message.header.stream_id = stream_id;
        message
    }
}

macro_rules! impl_from_packet {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Packet {
                fn from(p: $ty) -> Self {
                    Packet::$variant(p)
                }
            }
        )*
    };
}

impl_from_packet!(
    ConnectApp(ConnectAppPacket),
    ConnectAppResult(ConnectAppResultPacket),
    CreateStream(CreateStreamPacket),
    CreateStreamResult(CreateStreamResultPacket),
    Publish(PublishPacket),
    Play(PlayPacket),
    Pause(PausePacket),
    FmleStart(FmleStartPacket),
    FmleStartResult(FmleStartResultPacket),
    OnStatus(OnStatusPacket),
    OnMetaData(OnMetaDataPacket),
    SampleAccess(SampleAccessPacket),
    SetChunkSize(SetChunkSizePacket),
    SetPeerBandwidth(SetPeerBandwidthPacket),
    SetWindowAckSize(SetWindowAckSizePacket),
    Acknowledgement(AcknowledgementPacket),
    UserControl(UserControlEvent),
    CloseStream(CloseStreamPacket),
);

/// Start a command payload: name and transaction id
fn command_encoder(name: &str, transaction_id: f64) -> Amf0Encoder {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(&AmfValue::from(name));
    encoder.encode(&AmfValue::Number(transaction_id));
    encoder
}

/// Read an object or ECMA array, treating anything else as empty
fn decode_object_or_empty(decoder: &mut Amf0Decoder, payload: &mut Bytes) -> Result<AmfObject> {
    Ok(match decoder.decode_optional(payload)? {
        Some(AmfValue::Object(o)) | Some(AmfValue::EcmaArray(o)) => o,
        _ => AmfObject::new(),
    })
}

fn require(payload: &Bytes, message_type: u8, len: usize) -> Result<()> {
    if payload.remaining() < len {
        return Err(ProtocolError::TruncatedPayload {
            message_type,
            len: payload.remaining(),
        }
        .into());
    }
    Ok(())
}

// ============================================================================
// NetConnection commands
// ============================================================================

/// `connect` request
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectAppPacket {
    pub transaction_id: f64,
    pub command_object: AmfObject,
    /// Optional user arguments appended by some clients
    pub args: Option<AmfObject>,
}

impl ConnectAppPacket {
    pub fn new(command_object: AmfObject) -> Self {
        Self {
            transaction_id: 1.0,
            command_object,
            args: None,
        }
    }

    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        let command_object = decoder.expect_object(payload)?;
        let args = match decoder.decode_optional(payload)? {
            Some(AmfValue::Object(o)) => Some(o),
            _ => None,
        };
        Ok(Self {
            transaction_id,
            command_object,
            args,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_CONNECT, self.transaction_id);
        encoder.encode(&AmfValue::Object(self.command_object.clone()));
        if let Some(args) = &self.args {
            encoder.encode(&AmfValue::Object(args.clone()));
        }
        encoder.finish()
    }
}

/// `_result` / `_error` response to `connect`
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectAppResultPacket {
    /// `_result` or `_error`
    pub command_name: String,
    pub transaction_id: f64,
    pub props: AmfObject,
    pub info: AmfObject,
}

impl ConnectAppResultPacket {
    /// Successful connect response
    pub fn accept(transaction_id: f64, object_encoding: f64) -> Self {
        Self {
            command_name: CMD_RESULT.to_string(),
            transaction_id,
            props: AmfObject::new()
                .with("fmsVer", FMS_VERSION)
                .with("capabilities", 127.0)
                .with("mode", 1.0),
            info: AmfObject::new()
                .with("level", STATUS_LEVEL)
                .with("code", NC_CONNECT_SUCCESS)
                .with("description", "Connection succeeded")
                .with("objectEncoding", object_encoding)
                .with(
                    "data",
                    AmfValue::EcmaArray(AmfObject::new().with("version", "3,5,3,888")),
                ),
        }
    }

    /// Rejected connect response
    pub fn reject(transaction_id: f64, description: &str) -> Self {
        Self {
            command_name: CMD_ERROR.to_string(),
            transaction_id,
            props: AmfObject::new(),
            info: AmfObject::new()
                .with("level", ERROR_LEVEL)
                .with("code", NC_CONNECT_REJECTED)
                .with("description", description),
        }
    }

    /// Rejected connect response pointing the client elsewhere
    pub fn redirect(transaction_id: f64, url: &str) -> Self {
        let mut packet = Self::reject(transaction_id, "Redirect");
        packet.info.insert(
            "ex",
            AmfObject::new().with("code", 302.0).with("redirect", url),
        );
        packet
    }

    pub fn is_error(&self) -> bool {
        self.command_name == CMD_ERROR
    }

    pub fn decode(name: &str, payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        let props = decode_object_or_empty(&mut decoder, payload)?;
        let info = decode_object_or_empty(&mut decoder, payload)?;
        Ok(Self {
            command_name: name.to_string(),
            transaction_id,
            props,
            info,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(&self.command_name, self.transaction_id);
        if self.props.is_empty() {
            encoder.encode(&AmfValue::Null);
        } else {
            encoder.encode(&AmfValue::Object(self.props.clone()));
        }
        encoder.encode(&AmfValue::Object(self.info.clone()));
        encoder.finish()
    }
}

/// `createStream` request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStreamPacket {
    pub transaction_id: f64,
}

impl CreateStreamPacket {
    pub fn new(transaction_id: f64) -> Self {
        Self { transaction_id }
    }

    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        // command object, null
        decoder.decode_optional(payload)?;
        Ok(Self { transaction_id })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_CREATE_STREAM, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.finish()
    }
}

/// `_result` response to `createStream`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStreamResultPacket {
    pub transaction_id: f64,
    pub stream_id: f64,
}

impl CreateStreamResultPacket {
    pub fn new(transaction_id: f64, stream_id: u32) -> Self {
        Self {
            transaction_id,
            stream_id: stream_id as f64,
        }
    }

    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode(payload)?;
        let stream_id = decoder.expect_number(payload)?;
        Ok(Self {
            transaction_id,
            stream_id,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_RESULT, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::Number(self.stream_id));
        encoder.finish()
    }
}

// ============================================================================
// NetStream commands
// ============================================================================

/// `publish` request
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPacket {
    pub transaction_id: f64,
    pub stream_name: String,
    /// "live", "record" or "append"
    pub stream_type: String,
}

impl PublishPacket {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            transaction_id: 0.0,
            stream_name: stream_name.into(),
            stream_type: "live".to_string(),
        }
    }

    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode(payload)?;
        let stream_name = decoder.expect_string(payload)?;
        let stream_type = match decoder.decode_optional(payload)? {
            Some(AmfValue::String(s)) => s,
            _ => "live".to_string(),
        };
        Ok(Self {
            transaction_id,
            stream_name,
            stream_type,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_PUBLISH, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::from(self.stream_name.as_str()));
        encoder.encode(&AmfValue::from(self.stream_type.as_str()));
        encoder.finish()
    }
}

/// `play` request
#[derive(Debug, Clone, PartialEq)]
pub struct PlayPacket {
    pub transaction_id: f64,
    pub stream_name: String,
    /// -2 = live or recorded, -1 = live only, >= 0 = seek position in ms
    pub start: f64,
    /// -1 = until the end
    pub duration: f64,
    /// Discard any previous playlist
    pub reset: bool,
}

impl PlayPacket {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            transaction_id: 0.0,
            stream_name: stream_name.into(),
            start: -2.0,
            duration: -1.0,
            reset: true,
        }
    }

    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode(payload)?;
        let mut packet = Self::new(decoder.expect_string(payload)?);
        packet.transaction_id = transaction_id;

        if let Some(AmfValue::Number(start)) = decoder.decode_optional(payload)? {
            packet.start = start;
        }
        if let Some(AmfValue::Number(duration)) = decoder.decode_optional(payload)? {
            packet.duration = duration;
        }
        // older clients send reset as a number
        match decoder.decode_optional(payload)? {
            Some(AmfValue::Boolean(reset)) => packet.reset = reset,
            Some(AmfValue::Number(n)) => packet.reset = n != 0.0,
            _ => {}
        }
        Ok(packet)
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_PLAY, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::from(self.stream_name.as_str()));
        encoder.encode(&AmfValue::Number(self.start));
        encoder.encode(&AmfValue::Number(self.duration));
        encoder.encode(&AmfValue::Boolean(self.reset));
        encoder.finish()
    }
}

/// `pause` request
#[derive(Debug, Clone, PartialEq)]
pub struct PausePacket {
    pub transaction_id: f64,
    /// true to pause, false to resume
    pub is_pause: bool,
    /// Stream position in milliseconds
    pub time_ms: f64,
}

impl PausePacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode(payload)?;
        let is_pause = decoder.expect_boolean(payload)?;
        let time_ms = decoder.expect_number(payload)?;
        Ok(Self {
            transaction_id,
            is_pause,
            time_ms,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_PAUSE, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::Boolean(self.is_pause));
        encoder.encode(&AmfValue::Number(self.time_ms));
        encoder.finish()
    }
}

/// `releaseStream`, `FCPublish` or `FCUnpublish` from FMLE-style encoders
#[derive(Debug, Clone, PartialEq)]
pub struct FmleStartPacket {
    pub command_name: String,
    pub transaction_id: f64,
    pub stream_name: String,
}

impl FmleStartPacket {
    pub fn new(command_name: &str, transaction_id: f64, stream_name: impl Into<String>) -> Self {
        Self {
            command_name: command_name.to_string(),
            transaction_id,
            stream_name: stream_name.into(),
        }
    }

    pub fn is_release_stream(&self) -> bool {
        self.command_name == CMD_RELEASE_STREAM
    }

    pub fn is_fc_publish(&self) -> bool {
        self.command_name == CMD_FC_PUBLISH
    }

    pub fn is_fc_unpublish(&self) -> bool {
        self.command_name == CMD_FC_UNPUBLISH
    }

    pub fn decode(name: &str, payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode(payload)?;
        let stream_name = match decoder.decode_optional(payload)? {
            Some(AmfValue::String(s)) => s,
            _ => String::new(),
        };
        Ok(Self::new(name, transaction_id, stream_name))
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(&self.command_name, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::from(self.stream_name.as_str()));
        encoder.finish()
    }
}

/// `_result` response to an FMLE start command
#[derive(Debug, Clone, PartialEq)]
pub struct FmleStartResultPacket {
    pub transaction_id: f64,
}

impl FmleStartResultPacket {
    pub fn new(transaction_id: f64) -> Self {
        Self { transaction_id }
    }

    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        Ok(Self { transaction_id })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_RESULT, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::Undefined);
        encoder.finish()
    }
}

/// `closeStream` request
#[derive(Debug, Clone, PartialEq)]
pub struct CloseStreamPacket {
    pub transaction_id: f64,
}

impl CloseStreamPacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode_optional(payload)?;
        Ok(Self { transaction_id })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(CMD_CLOSE_STREAM, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.finish()
    }
}

/// Status notification: `onStatus`, `onFCPublish` or `onFCUnpublish`
#[derive(Debug, Clone, PartialEq)]
pub struct OnStatusPacket {
    pub command_name: String,
    pub transaction_id: f64,
    pub data: AmfObject,
}

impl OnStatusPacket {
    /// `onStatus` at level "status"
    pub fn status(code: &str, description: &str) -> Self {
        Self {
            command_name: CMD_ON_STATUS.to_string(),
            transaction_id: 0.0,
            data: AmfObject::new()
                .with("level", STATUS_LEVEL)
                .with("code", code)
                .with("description", description),
        }
    }

    /// Send under a different command name
    pub fn with_command_name(mut self, name: &str) -> Self {
        self.command_name = name.to_string();
        self
    }

    /// Add an info property
    pub fn with(mut self, key: &str, value: impl Into<AmfValue>) -> Self {
        self.data.insert(key, value);
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.data.get("code").and_then(AmfValue::as_str)
    }

    pub fn decode(name: &str, payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let transaction_id = decoder.expect_number(payload)?;
        decoder.decode(payload)?;
        let data = decode_object_or_empty(&mut decoder, payload)?;
        Ok(Self {
            command_name: name.to_string(),
            transaction_id,
            data,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = command_encoder(&self.command_name, self.transaction_id);
        encoder.encode(&AmfValue::Null);
        encoder.encode(&AmfValue::Object(self.data.clone()));
        encoder.finish()
    }
}

// ============================================================================
// Data messages
// ============================================================================

/// `@setDataFrame` / `onMetaData` stream metadata
#[derive(Debug, Clone, PartialEq)]
pub struct OnMetaDataPacket {
    /// Name the packet arrived under
    pub name: String,
    pub metadata: AmfValue,
}

impl OnMetaDataPacket {
    pub fn new(metadata: AmfValue) -> Self {
        Self {
            name: CMD_ON_METADATA.to_string(),
            metadata,
        }
    }

    pub fn decode(name: &str, payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let mut metadata = decoder.decode(payload)?;
        // "@setDataFrame", "onMetaData", {...}
        if name == CMD_SET_DATA_FRAME && matches!(metadata, AmfValue::String(_)) {
            metadata = decoder.decode(payload)?;
        }
        Ok(Self {
            name: name.to_string(),
            metadata,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = Amf0Encoder::new();
        if self.name == CMD_SET_DATA_FRAME {
            encoder.encode(&AmfValue::from(CMD_SET_DATA_FRAME));
        }
        encoder.encode(&AmfValue::from(CMD_ON_METADATA));
        encoder.encode(&self.metadata);
        encoder.finish()
    }
}

/// `|RtmpSampleAccess`, lets Flash players read raw samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleAccessPacket {
    pub video_sample_access: bool,
    pub audio_sample_access: bool,
}

impl SampleAccessPacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        let mut decoder = Amf0Decoder::new();
        let video_sample_access = decoder.expect_boolean(payload)?;
        let audio_sample_access = decoder.expect_boolean(payload)?;
        Ok(Self {
            video_sample_access,
            audio_sample_access,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&AmfValue::from(CMD_SAMPLE_ACCESS));
        encoder.encode(&AmfValue::Boolean(self.video_sample_access));
        encoder.encode(&AmfValue::Boolean(self.audio_sample_access));
        encoder.finish()
    }
}

// ============================================================================
// Protocol control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetChunkSizePacket {
    pub chunk_size: u32,
}

impl SetChunkSizePacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        require(payload, MSG_SET_CHUNK_SIZE, 4)?;
        // MSB is reserved
        Ok(Self {
            chunk_size: payload.get_u32() & 0x7FFF_FFFF,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(self.chunk_size);
        buf.freeze()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPeerBandwidthPacket {
    pub bandwidth: u32,
    /// Hard, soft or dynamic
    pub limit_type: u8,
}

impl SetPeerBandwidthPacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        require(payload, MSG_SET_PEER_BANDWIDTH, 5)?;
        Ok(Self {
            bandwidth: payload.get_u32(),
            limit_type: payload.get_u8(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u32(self.bandwidth);
        buf.put_u8(self.limit_type);
        buf.freeze()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetWindowAckSizePacket {
    pub ack_window_size: u32,
}

impl SetWindowAckSizePacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        require(payload, MSG_WINDOW_ACK_SIZE, 4)?;
        Ok(Self {
            ack_window_size: payload.get_u32(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(self.ack_window_size);
        buf.freeze()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcknowledgementPacket {
    /// Total bytes received so far
    pub sequence_number: u32,
}

impl AcknowledgementPacket {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        require(payload, MSG_ACKNOWLEDGEMENT, 4)?;
        Ok(Self {
            sequence_number: payload.get_u32(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u32(self.sequence_number);
        buf.freeze()
    }
}

/// User Control Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest(u32),
    PingResponse(u32),
    Unknown { event_type: u16, data: Bytes },
}

impl UserControlEvent {
    pub fn decode(payload: &mut Bytes) -> Result<Self> {
        require(payload, MSG_USER_CONTROL, 2)?;
        let event_type = payload.get_u16();

        if event_type == UC_SET_BUFFER_LENGTH {
            require(payload, MSG_USER_CONTROL, 8)?;
            let stream_id = payload.get_u32();
            let buffer_ms = payload.get_u32();
            return Ok(UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            });
        }

        let known = matches!(
            event_type,
            UC_STREAM_BEGIN
                | UC_STREAM_EOF
                | UC_STREAM_DRY
                | UC_STREAM_IS_RECORDED
                | UC_PING_REQUEST
                | UC_PING_RESPONSE
        );
        if !known {
            return Ok(UserControlEvent::Unknown {
                event_type,
                data: payload.split_to(payload.len()),
            });
        }

        require(payload, MSG_USER_CONTROL, 4)?;
        let value = payload.get_u32();
        Ok(match event_type {
            UC_STREAM_BEGIN => UserControlEvent::StreamBegin(value),
            UC_STREAM_EOF => UserControlEvent::StreamEof(value),
            UC_STREAM_DRY => UserControlEvent::StreamDry(value),
            UC_STREAM_IS_RECORDED => UserControlEvent::StreamIsRecorded(value),
            UC_PING_REQUEST => UserControlEvent::PingRequest(value),
            _ => UserControlEvent::PingResponse(value),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(10);
        match self {
            UserControlEvent::StreamBegin(id) => {
                buf.put_u16(UC_STREAM_BEGIN);
                buf.put_u32(*id);
            }
            UserControlEvent::StreamEof(id) => {
                buf.put_u16(UC_STREAM_EOF);
                buf.put_u32(*id);
            }
            UserControlEvent::StreamDry(id) => {
                buf.put_u16(UC_STREAM_DRY);
                buf.put_u32(*id);
            }
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            } => {
                buf.put_u16(UC_SET_BUFFER_LENGTH);
                buf.put_u32(*stream_id);
                buf.put_u32(*buffer_ms);
            }
            UserControlEvent::StreamIsRecorded(id) => {
                buf.put_u16(UC_STREAM_IS_RECORDED);
                buf.put_u32(*id);
            }
            UserControlEvent::PingRequest(ts) => {
                buf.put_u16(UC_PING_REQUEST);
                buf.put_u32(*ts);
            }
            UserControlEvent::PingResponse(ts) => {
                buf.put_u16(UC_PING_RESPONSE);
                buf.put_u32(*ts);
            }
            UserControlEvent::Unknown { event_type, data } => {
                buf.put_u16(*event_type);
                buf.put_slice(data);
            }
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::amf0;
    use crate::error::{AmfError, Error};

    fn command_message(message_type: u8, values: &[AmfValue]) -> Message {
        Message::new(message_type, 0, CID_OVER_CONNECTION, amf0::encode_all(values))
    }

    fn decode(packet: &Packet) -> Packet {
        Packet::decode(&packet.to_message(1)).unwrap().unwrap()
    }

    #[test]
    fn test_connect_decodes_from_wire_values() {
        let msg = command_message(
            MSG_COMMAND_AMF0,
            &[
                "connect".into(),
                1.0.into(),
                AmfValue::Object(
                    AmfObject::new()
                        .with("app", "live")
                        .with("swfUrl", "")
                        .with("tcUrl", "rtmp://localhost/live"),
                ),
            ],
        );

        match Packet::decode(&msg).unwrap() {
            Some(Packet::ConnectApp(connect)) => {
                assert_eq!(connect.transaction_id, 1.0);
                assert_eq!(
                    connect.command_object.get("app"),
                    Some(&AmfValue::String("live".into()))
                );
                assert_eq!(
                    connect.command_object.get("swfUrl"),
                    Some(&AmfValue::String(String::new()))
                );
                assert!(connect.args.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_command_roundtrips() {
        let packets: Vec<Packet> = vec![
            ConnectAppPacket::new(AmfObject::new().with("app", "live")).into(),
            CreateStreamPacket::new(2.0).into(),
            PublishPacket::new("key").into(),
            PlayPacket::new("movie").into(),
            PausePacket {
                transaction_id: 0.0,
                is_pause: true,
                time_ms: 1500.0,
            }
            .into(),
            FmleStartPacket::new(CMD_RELEASE_STREAM, 2.0, "key").into(),
            FmleStartPacket::new(CMD_FC_PUBLISH, 3.0, "key").into(),
            FmleStartPacket::new(CMD_FC_UNPUBLISH, 6.0, "key").into(),
            CloseStreamPacket {
                transaction_id: 0.0,
            }
            .into(),
            OnMetaDataPacket::new(AmfValue::EcmaArray(AmfObject::new().with("width", 1280.0)))
                .into(),
        ];

        for packet in packets {
            assert_eq!(decode(&packet), packet);
        }
    }

    #[test]
    fn test_control_roundtrips() {
        let packets: Vec<Packet> = vec![
            SetChunkSizePacket { chunk_size: 4096 }.into(),
            SetWindowAckSizePacket {
                ack_window_size: 2_500_000,
            }
            .into(),
            SetPeerBandwidthPacket {
                bandwidth: 2_500_000,
                limit_type: BANDWIDTH_LIMIT_DYNAMIC,
            }
            .into(),
            AcknowledgementPacket {
                sequence_number: 12345,
            }
            .into(),
            UserControlEvent::StreamBegin(1).into(),
            UserControlEvent::SetBufferLength {
                stream_id: 1,
                buffer_ms: 3000,
            }
            .into(),
            UserControlEvent::PingRequest(99).into(),
            UserControlEvent::Unknown {
                event_type: 31,
                data: Bytes::from_static(&[1, 2, 3]),
            }
            .into(),
        ];

        for packet in packets {
            let msg = packet.to_message(0);
            assert_eq!(msg.header.prefer_cid, CID_PROTOCOL_CONTROL);
            assert_eq!(decode(&packet), packet);
        }
    }

    #[test]
    fn test_response_packets_decode() {
        let result = ConnectAppResultPacket::accept(1.0, 0.0);
        let mut payload = result.encode();
        let name = Amf0Decoder::new().expect_string(&mut payload).unwrap();
        let decoded = ConnectAppResultPacket::decode(&name, &mut payload).unwrap();
        assert_eq!(decoded, result);
        assert!(!decoded.is_error());
        assert_eq!(
            decoded.info.get("code"),
            Some(&AmfValue::String(NC_CONNECT_SUCCESS.into()))
        );

        let mut payload = CreateStreamResultPacket::new(4.0, 1).encode();
        Amf0Decoder::new().expect_string(&mut payload).unwrap();
        let decoded = CreateStreamResultPacket::decode(&mut payload).unwrap();
        assert_eq!(decoded.transaction_id, 4.0);
        assert_eq!(decoded.stream_id, 1.0);

        let mut payload = FmleStartResultPacket::new(3.0).encode();
        Amf0Decoder::new().expect_string(&mut payload).unwrap();
        assert_eq!(
            FmleStartResultPacket::decode(&mut payload).unwrap(),
            FmleStartResultPacket::new(3.0)
        );

        let status = OnStatusPacket::status(NS_PUBLISH_START, "Started").with("clientid", "abc");
        let mut payload = status.encode();
        let name = Amf0Decoder::new().expect_string(&mut payload).unwrap();
        assert_eq!(name, CMD_ON_STATUS);
        let decoded = OnStatusPacket::decode(&name, &mut payload).unwrap();
        assert_eq!(decoded.code(), Some(NS_PUBLISH_START));
        assert_eq!(decoded, status);

        let mut payload = SampleAccessPacket {
            video_sample_access: true,
            audio_sample_access: false,
        }
        .encode();
        let name = Amf0Decoder::new().expect_string(&mut payload).unwrap();
        assert_eq!(name, CMD_SAMPLE_ACCESS);
        let decoded = SampleAccessPacket::decode(&mut payload).unwrap();
        assert!(decoded.video_sample_access);
        assert!(!decoded.audio_sample_access);
    }

    #[test]
    fn test_reject_and_redirect() {
        let reject = ConnectAppResultPacket::reject(1.0, "bad app");
        assert!(reject.is_error());
        assert_eq!(
            reject.info.get("code").and_then(AmfValue::as_str),
            Some(NC_CONNECT_REJECTED)
        );

        let redirect = ConnectAppResultPacket::redirect(1.0, "rtmp://other/live");
        let ex = redirect.info.get("ex").unwrap();
        assert_eq!(ex.get_string("redirect"), Some("rtmp://other/live"));
    }

    #[test]
    fn test_set_data_frame_metadata() {
        let metadata = AmfValue::EcmaArray(
            AmfObject::new()
                .with("width", 1920.0)
                .with("height", 1080.0),
        );
        let msg = command_message(
            MSG_DATA_AMF0,
            &["@setDataFrame".into(), "onMetaData".into(), metadata.clone()],
        );

        match Packet::decode(&msg).unwrap() {
            Some(Packet::OnMetaData(p)) => {
                assert_eq!(p.name, CMD_SET_DATA_FRAME);
                assert_eq!(p.metadata, metadata);
                // re-encodes with the same framing
                assert_eq!(p.encode(), msg.payload);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_play_defaults_and_numeric_reset() {
        let msg = command_message(
            MSG_COMMAND_AMF0,
            &["play".into(), 0.0.into(), AmfValue::Null, "movie".into()],
        );
        let Some(Packet::Play(play)) = Packet::decode(&msg).unwrap() else {
            panic!("expected play");
        };
        assert_eq!(play.start, -2.0);
        assert_eq!(play.duration, -1.0);
        assert!(play.reset);

        let msg = command_message(
            MSG_COMMAND_AMF0,
            &[
                "play".into(),
                0.0.into(),
                AmfValue::Null,
                "movie".into(),
                0.0.into(),
                (-1.0).into(),
                0.0.into(),
            ],
        );
        let Some(Packet::Play(play)) = Packet::decode(&msg).unwrap() else {
            panic!("expected play");
        };
        assert_eq!(play.start, 0.0);
        assert!(!play.reset);
    }

    #[test]
    fn test_amf3_command_skips_leading_byte() {
        let mut payload = BytesMut::new();
        payload.put_u8(0x00);
        payload.put_slice(&amf0::encode_all(&[
            "createStream".into(),
            2.0.into(),
            AmfValue::Null,
        ]));
        let msg = Message::new(MSG_COMMAND_AMF3, 0, CID_OVER_CONNECTION, payload.freeze());

        assert_eq!(
            Packet::decode(&msg).unwrap(),
            Some(Packet::CreateStream(CreateStreamPacket::new(2.0)))
        );
    }

    #[test]
    fn test_unknown_command_and_media_ignored() {
        let msg = command_message(
            MSG_COMMAND_AMF0,
            &["getStreamLength".into(), 5.0.into(), AmfValue::Null],
        );
        assert_eq!(Packet::decode(&msg).unwrap(), None);

        let audio = Message::new(MSG_AUDIO, 0, CID_AUDIO, Bytes::from_static(&[0xAF, 0x01]));
        assert_eq!(Packet::decode(&audio).unwrap(), None);

        let abort = Message::new(MSG_ABORT, 0, CID_PROTOCOL_CONTROL, Bytes::from_static(&[0, 0, 0, 6]));
        assert_eq!(Packet::decode(&abort).unwrap(), None);
    }

    #[test]
    fn test_set_chunk_size_ignores_msb() {
        let msg = Message::new(
            MSG_SET_CHUNK_SIZE,
            0,
            CID_PROTOCOL_CONTROL,
            Bytes::from_static(&[0x80, 0x00, 0x10, 0x00]),
        );
        assert_eq!(
            Packet::decode(&msg).unwrap(),
            Some(Packet::SetChunkSize(SetChunkSizePacket { chunk_size: 4096 }))
        );
    }

    #[test]
    fn test_truncated_control_message() {
        let msg = Message::new(
            MSG_WINDOW_ACK_SIZE,
            0,
            CID_PROTOCOL_CONTROL,
            Bytes::from_static(&[0x00, 0x01]),
        );
        assert!(matches!(
            Packet::decode(&msg),
            Err(Error::Protocol(ProtocolError::TruncatedPayload {
                message_type: MSG_WINDOW_ACK_SIZE,
                len: 2
            }))
        ));
    }

    #[test]
    fn test_bad_command_arguments_are_amf_errors() {
        // publish without a stream name
        let msg = command_message(MSG_COMMAND_AMF0, &["publish".into(), 0.0.into(), AmfValue::Null]);
        let err = Packet::decode(&msg).unwrap_err();
        assert!(matches!(err, Error::Amf(AmfError::UnexpectedEof)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_preferred_cids_and_types() {
        let status: Packet = OnStatusPacket::status(NS_PLAY_START, "").into();
        assert_eq!(status.preferred_cid(), CID_OVER_STREAM);
        assert_eq!(status.message_type(), MSG_COMMAND_AMF0);

        let meta: Packet = OnMetaDataPacket::new(AmfValue::Null).into();
        assert_eq!(meta.preferred_cid(), CID_OVER_CONNECTION2);
        assert_eq!(meta.message_type(), MSG_DATA_AMF0);

        let result: Packet = CreateStreamResultPacket::new(2.0, 1).into();
        assert_eq!(result.preferred_cid(), CID_OVER_CONNECTION);

        let msg = status.to_message(1);
        assert_eq!(msg.stream_id(), 1);
        assert_eq!(msg.header.payload_length as usize, msg.size());
    }
}
