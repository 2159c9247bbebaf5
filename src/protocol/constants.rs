//! RTMP protocol constants
//!
//! Reference: Adobe RTMP Specification (December 2012)

/// RTMP version number (3 is the plain-text handshake)
pub const RTMP_VERSION: u8 = 3;

/// Default RTMP port
pub const RTMP_PORT: u16 = 1935;

/// Size of C1/C2/S1/S2
pub const HANDSHAKE_SIZE: usize = 1536;

/// Default chunk size until a Set Chunk Size arrives
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Chunk size the server announces after connect
pub const RECOMMENDED_CHUNK_SIZE: u32 = 4096;

/// Largest chunk size a peer may announce (31 bits)
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

/// Largest payload length expressible in the 3-byte length field
pub const MAX_MESSAGE_SIZE: u32 = 0xFF_FFFF;

/// Compact timestamp value that signals an extended timestamp
pub const EXTENDED_TIMESTAMP_THRESHOLD: u32 = 0xFF_FFFF;

/// Effective timestamps keep 31 bits
pub const TIMESTAMP_MASK: u32 = 0x7FFF_FFFF;

// ============================================================================
// Chunk Stream IDs
// ============================================================================

/// Protocol control messages (Set Chunk Size, Window Ack, ...)
pub const CID_PROTOCOL_CONTROL: u32 = 2;

/// NetConnection commands (connect, createStream, ...)
pub const CID_OVER_CONNECTION: u32 = 3;

/// Secondary connection channel, used for data messages
pub const CID_OVER_CONNECTION2: u32 = 4;

/// NetStream commands (publish, play, onStatus, ...)
pub const CID_OVER_STREAM: u32 = 5;

pub const CID_VIDEO: u32 = 6;
pub const CID_AUDIO: u32 = 7;
pub const CID_OVER_STREAM2: u32 = 8;

/// Largest id representable by the 3-byte basic header
pub const MAX_CID: u32 = 65599;

// ============================================================================
// Message Type IDs
// ============================================================================

pub const MSG_SET_CHUNK_SIZE: u8 = 0x01;
pub const MSG_ABORT: u8 = 0x02;
pub const MSG_ACKNOWLEDGEMENT: u8 = 0x03;
pub const MSG_USER_CONTROL: u8 = 0x04;
pub const MSG_WINDOW_ACK_SIZE: u8 = 0x05;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 0x06;
pub const MSG_AUDIO: u8 = 0x08;
pub const MSG_VIDEO: u8 = 0x09;
pub const MSG_DATA_AMF3: u8 = 0x0F;
pub const MSG_SHARED_OBJECT_AMF3: u8 = 0x10;
pub const MSG_COMMAND_AMF3: u8 = 0x11;
pub const MSG_DATA_AMF0: u8 = 0x12;
pub const MSG_SHARED_OBJECT_AMF0: u8 = 0x13;
pub const MSG_COMMAND_AMF0: u8 = 0x14;
pub const MSG_AGGREGATE: u8 = 0x16;

// ============================================================================
// User Control Event Types
// ============================================================================

pub const UC_STREAM_BEGIN: u16 = 0;
pub const UC_STREAM_EOF: u16 = 1;
pub const UC_STREAM_DRY: u16 = 2;
pub const UC_SET_BUFFER_LENGTH: u16 = 3;
pub const UC_STREAM_IS_RECORDED: u16 = 4;
pub const UC_PING_REQUEST: u16 = 6;
pub const UC_PING_RESPONSE: u16 = 7;

// ============================================================================
// Peer Bandwidth Limit Types
// ============================================================================

pub const BANDWIDTH_LIMIT_HARD: u8 = 0;
pub const BANDWIDTH_LIMIT_SOFT: u8 = 1;
pub const BANDWIDTH_LIMIT_DYNAMIC: u8 = 2;

// ============================================================================
// Command Names
// ============================================================================

pub const CMD_CONNECT: &str = "connect";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_CLOSE_STREAM: &str = "closeStream";
pub const CMD_PLAY: &str = "play";
pub const CMD_PAUSE: &str = "pause";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_RESULT: &str = "_result";
pub const CMD_ERROR: &str = "_error";
pub const CMD_ON_STATUS: &str = "onStatus";

// FMLE/OBS publish sequence
pub const CMD_RELEASE_STREAM: &str = "releaseStream";
pub const CMD_FC_PUBLISH: &str = "FCPublish";
pub const CMD_FC_UNPUBLISH: &str = "FCUnpublish";
pub const CMD_ON_FC_PUBLISH: &str = "onFCPublish";
pub const CMD_ON_FC_UNPUBLISH: &str = "onFCUnpublish";

// Data messages
pub const CMD_SET_DATA_FRAME: &str = "@setDataFrame";
pub const CMD_ON_METADATA: &str = "onMetaData";
pub const CMD_SAMPLE_ACCESS: &str = "|RtmpSampleAccess";

// ============================================================================
// Status Codes
// ============================================================================

pub const NC_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
pub const NC_CONNECT_REJECTED: &str = "NetConnection.Connect.Rejected";

pub const NS_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const NS_PUBLISH_BAD_NAME: &str = "NetStream.Publish.BadName";
pub const NS_UNPUBLISH_SUCCESS: &str = "NetStream.Unpublish.Success";
pub const NS_PLAY_RESET: &str = "NetStream.Play.Reset";
pub const NS_PLAY_START: &str = "NetStream.Play.Start";
pub const NS_PLAY_FAILED: &str = "NetStream.Play.Failed";
pub const NS_PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
pub const NS_UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";

pub const STATUS_LEVEL: &str = "status";
pub const ERROR_LEVEL: &str = "error";

// ============================================================================
// Default Server Settings
// ============================================================================

/// Default window acknowledgement size (2.5 MB)
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Default peer bandwidth (2.5 MB)
pub const DEFAULT_PEER_BANDWIDTH: u32 = 2_500_000;

/// Message stream id handed out by createStream
pub const DEFAULT_STREAM_ID: u32 = 1;

// ============================================================================
// Chunk Header Format Types (fmt field)
// ============================================================================

/// Type 0: Full header (11 bytes) - timestamp, length, type, stream ID
pub const CHUNK_FMT_0: u8 = 0;

/// Type 1: No stream ID (7 bytes) - timestamp delta, length, type
pub const CHUNK_FMT_1: u8 = 1;

/// Type 2: Timestamp delta only (3 bytes)
pub const CHUNK_FMT_2: u8 = 2;

/// Type 3: No header (0 bytes) - use previous chunk's values
pub const CHUNK_FMT_3: u8 = 3;
