//! RTMP message header and reassembled message
//!
//! RTMP messages are classified into:
//! - Protocol Control Messages (types 1-6): chunk/flow control
//! - Command Messages (types 17, 20): AMF-encoded commands
//! - Data Messages (types 15, 18): metadata
//! - Audio/Video Messages (types 8, 9): media data
//!
//! Reference: RTMP Specification Section 5.4

use bytes::Bytes;

use crate::protocol::constants::*;

/// Message header as tracked per chunk stream
///
/// `timestamp_delta` only matters while decoding. `timestamp` is the
/// resolved absolute value, always masked to 31 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Last timestamp delta read from a compressed header
    pub timestamp_delta: u32,
    /// Payload length in bytes (3 bytes on the wire)
    pub payload_length: u32,
    /// Message type id
    pub message_type: u8,
    /// Message stream id (little-endian on the wire)
    pub stream_id: u32,
    /// Absolute timestamp in milliseconds
    pub timestamp: u32,
    /// Chunk stream this message arrived on, or should be sent over
    pub prefer_cid: u32,
}

impl MessageHeader {
    pub fn is_audio(&self) -> bool {
        self.message_type == MSG_AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.message_type == MSG_VIDEO
    }

    pub fn is_aggregate(&self) -> bool {
        self.message_type == MSG_AGGREGATE
    }

    /// Audio, video or aggregate
    pub fn is_media(&self) -> bool {
        self.is_audio() || self.is_video() || self.is_aggregate()
    }

    pub fn is_amf0_command(&self) -> bool {
        self.message_type == MSG_COMMAND_AMF0
    }

    pub fn is_amf3_command(&self) -> bool {
        self.message_type == MSG_COMMAND_AMF3
    }

    pub fn is_amf0_data(&self) -> bool {
        self.message_type == MSG_DATA_AMF0
    }

    pub fn is_amf3_data(&self) -> bool {
        self.message_type == MSG_DATA_AMF3
    }

    /// Command or data message carrying an AMF0 command name
    pub fn is_command_or_data(&self) -> bool {
        self.is_amf0_command() || self.is_amf3_command() || self.is_amf0_data() || self.is_amf3_data()
    }

    pub fn is_set_chunk_size(&self) -> bool {
        self.message_type == MSG_SET_CHUNK_SIZE
    }

    pub fn is_abort(&self) -> bool {
        self.message_type == MSG_ABORT
    }

    pub fn is_acknowledgement(&self) -> bool {
        self.message_type == MSG_ACKNOWLEDGEMENT
    }

    pub fn is_user_control(&self) -> bool {
        self.message_type == MSG_USER_CONTROL
    }

    pub fn is_window_ack_size(&self) -> bool {
        self.message_type == MSG_WINDOW_ACK_SIZE
    }

    pub fn is_set_peer_bandwidth(&self) -> bool {
        self.message_type == MSG_SET_PEER_BANDWIDTH
    }
}

/// A complete RTMP message, reassembled from one or more chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Bytes,
}

impl Message {
    /// Build an outbound message; the payload length is taken from `payload`
    pub fn new(message_type: u8, timestamp: u32, prefer_cid: u32, payload: Bytes) -> Self {
        Self {
            header: MessageHeader {
                payload_length: payload.len() as u32,
                message_type,
                timestamp: timestamp & TIMESTAMP_MASK,
                prefer_cid,
                ..Default::default()
            },
            payload,
        }
    }

    /// Number of payload bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn stream_id(&self) -> u32 {
        self.header.stream_id
    }
}
