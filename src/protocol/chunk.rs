//! RTMP chunk stream codec
//!
//! RTMP messages are split into chunks for multiplexing. Each chunk has a header
//! that identifies the chunk stream and message being sent.
//!
//! ```text
//! Chunk Format:
//! +-------------+-----------------+-------------------+
//! | Basic Header| Message Header  | Chunk Data        |
//! | (1-3 bytes) | (0,3,7,11 bytes)| (variable)        |
//! +-------------+-----------------+-------------------+
//!
//! Basic Header formats:
//! - 1 byte:  fmt(2) + cid(6)                 for cid 2-63
//! - 2 bytes: fmt(2) + 0 + (cid - 64)         for cid 64-319
//! - 3 bytes: fmt(2) + 1 + (cid - 64) as u16le for cid 64-65599
//!
//! Message Header formats (based on fmt):
//! - Type 0 (11 bytes): timestamp(3) + length(3) + type(1) + stream_id(4, LE)
//! - Type 1 (7 bytes):  timestamp_delta(3) + length(3) + type(1)
//! - Type 2 (3 bytes):  timestamp_delta(3)
//! - Type 3 (0 bytes):  (use previous chunk's values)
//!
//! Extended timestamp (4 bytes, absolute) follows when the 3-byte field is 0xFFFFFF
//! ```
//!
//! Decoding is sans-IO: [`ChunkDecoder::decode`] only consumes bytes once a
//! whole chunk is buffered, so an interrupted read never leaves a chunk
//! stream half-updated.
//!
//! Reference: RTMP Specification Section 5.3

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;
use crate::protocol::message::{Message, MessageHeader};

/// Message header size for each fmt value
const MESSAGE_HEADER_SIZE: [usize; 4] = [11, 7, 3, 0];

/// A message still being reassembled on a chunk stream
#[derive(Debug)]
struct PartialMessage {
    header: MessageHeader,
    payload: BytesMut,
}

impl PartialMessage {
    fn size(&self) -> u32 {
        self.payload.len() as u32
    }
}

/// Per-chunk-stream state
///
/// Holds the cached header used for header-compression inheritance and at
/// most one in-progress message.
#[derive(Debug, Default)]
pub struct ChunkStream {
    fmt: u8,
    header: MessageHeader,
    extended_timestamp: bool,
    msg_count: u64,
    partial: Option<PartialMessage>,
}

impl ChunkStream {
    /// Format of the last chunk seen
    pub fn fmt(&self) -> u8 {
        self.fmt
    }

    /// Cached header for compression inheritance
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn extended_timestamp(&self) -> bool {
        self.extended_timestamp
    }

    /// Number of messages fully received on this chunk stream
    pub fn msg_count(&self) -> u64 {
        self.msg_count
    }

    /// Bytes accumulated for the in-progress message, if any
    pub fn partial_size(&self) -> Option<u32> {
        self.partial.as_ref().map(PartialMessage::size)
    }
}

/// Parsed basic header: (fmt, cid, encoded length)
///
/// Returns `None` until enough bytes are buffered.
pub fn parse_basic_header(buf: &[u8]) -> Option<(u8, u32, usize)> {
    let first = *buf.first()?;
    let fmt = (first >> 6) & 0x03;

    match first & 0x3F {
        0 => {
            let b1 = *buf.get(1)?;
            Some((fmt, 64 + b1 as u32, 2))
        }
        1 => {
            let b1 = *buf.get(1)?;
            let b2 = *buf.get(2)?;
            Some((fmt, 64 + u16::from_le_bytes([b1, b2]) as u32, 3))
        }
        cid => Some((fmt, cid as u32, 1)),
    }
}

/// Reduce a chunk stream id to one the basic header can carry.
///
/// Ids in 2..=65599 are kept; anything else falls back to its low six
/// bits, with the reserved values 0 and 1 mapped to the connection channel.
pub fn encodable_cid(cid: u32) -> u32 {
    match cid {
        2..=MAX_CID => cid,
        _ => match cid & 0x3F {
            0 | 1 => CID_OVER_CONNECTION,
            low => low,
        },
    }
}

/// Write basic header
pub fn write_basic_header(fmt: u8, cid: u32, buf: &mut BytesMut) {
    let cid = encodable_cid(cid);
    if cid >= 64 + 256 {
        buf.put_u8((fmt << 6) | 1);
        buf.put_u16_le((cid - 64) as u16);
    } else if cid >= 64 {
        buf.put_u8(fmt << 6);
        buf.put_u8((cid - 64) as u8);
    } else {
        buf.put_u8((fmt << 6) | cid as u8);
    }
}

/// Write a complete chunk header (basic header, message header and
/// extended timestamp) for `header`.
///
/// Type 1 and 2 headers carry `header.timestamp_delta`. Once the absolute
/// timestamp or the delta reaches 0xFFFFFF the compact field is escaped and
/// the absolute timestamp follows as an extended timestamp; type 3 chunks
/// repeat it.
pub fn write_chunk_header(fmt: u8, cid: u32, header: &MessageHeader, buf: &mut BytesMut) {
    let extended = header.timestamp >= EXTENDED_TIMESTAMP_THRESHOLD
        || (matches!(fmt, CHUNK_FMT_1 | CHUNK_FMT_2)
            && header.timestamp_delta >= EXTENDED_TIMESTAMP_THRESHOLD);

    let compact = |value: u32| {
        if extended {
            EXTENDED_TIMESTAMP_THRESHOLD
        } else {
            value
        }
    };

    write_basic_header(fmt, cid, buf);

    match fmt {
        CHUNK_FMT_0 => {
            write_u24(compact(header.timestamp), buf);
            write_u24(header.payload_length, buf);
            buf.put_u8(header.message_type);
            buf.put_u32_le(header.stream_id);
        }
        CHUNK_FMT_1 => {
            write_u24(compact(header.timestamp_delta), buf);
            write_u24(header.payload_length, buf);
            buf.put_u8(header.message_type);
        }
        CHUNK_FMT_2 => {
            write_u24(compact(header.timestamp_delta), buf);
        }
        _ => {}
    }

    if extended {
        buf.put_u32(header.timestamp);
    }
}

/// Write 24-bit big-endian value
fn write_u24(value: u32, buf: &mut BytesMut) {
    buf.put_uint(u64::from(value & 0xFF_FFFF), 3);
}

/// Header fields resolved from one chunk, not yet committed
struct ChunkHeader {
    fmt: u8,
    cid: u32,
    header: MessageHeader,
    extended_timestamp: bool,
    /// Bytes of basic header, message header and extended timestamp
    header_len: usize,
}

/// Chunk stream decoder
///
/// Handles chunk demultiplexing and message reassembly.
pub struct ChunkDecoder {
    /// Maximum incoming chunk size
    chunk_size: u32,
    /// Per-chunk-stream state
    streams: HashMap<u32, ChunkStream>,
    /// Maximum message size (sanity limit)
    max_message_size: u32,
}

impl ChunkDecoder {
    /// Create a new decoder with default chunk size
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            // cids 2..8 cover nearly all traffic
            streams: HashMap::with_capacity(8),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Reject messages announcing a payload larger than `max`
    pub fn with_max_message_size(mut self, max: u32) -> Self {
        self.max_message_size = max;
        self
    }

    /// Set the inbound chunk size (called when receiving SetChunkSize)
    pub fn set_chunk_size(&mut self, size: u32) -> Result<()> {
        if size == 0 {
            return Err(ProtocolError::InvalidChunkSize(size).into());
        }
        self.chunk_size = size.min(MAX_CHUNK_SIZE);
        Ok(())
    }

    /// Get current chunk size
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// State of a chunk stream, if any chunk has been seen on it
    pub fn stream(&self, cid: u32) -> Option<&ChunkStream> {
        self.streams.get(&cid)
    }

    /// Decode buffered chunks until a message completes.
    ///
    /// Returns `Ok(None)` when more data is needed. Bytes are consumed one
    /// whole chunk at a time; a partial chunk is left in `buf` untouched.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>> {
        loop {
            let chunk = match self.parse_chunk_header(buf)? {
                Some(chunk) => chunk,
                None => return Ok(None),
            };

            let buffered = self
                .streams
                .get(&chunk.cid)
                .and_then(|s| s.partial.as_ref())
                .map_or(0, PartialMessage::size);
            let data_len = (chunk.header.payload_length - buffered).min(self.chunk_size) as usize;

            if buf.len() < chunk.header_len + data_len {
                return Ok(None);
            }

            buf.advance(chunk.header_len);
            let data = buf.split_to(data_len);

            if let Some(message) = self.commit(chunk, &data) {
                return Ok(Some(message));
            }
        }
    }

    /// Discard the partial message on a chunk stream (Abort message)
    pub fn abort(&mut self, cid: u32) {
        if let Some(stream) = self.streams.get_mut(&cid) {
            stream.partial = None;
        }
    }

    /// Resolve the next chunk's header against the cached chunk stream
    /// state without consuming anything.
    fn parse_chunk_header(&self, buf: &[u8]) -> Result<Option<ChunkHeader>> {
        let (fmt, cid, basic_len) = match parse_basic_header(buf) {
            Some(v) => v,
            None => return Ok(None),
        };

        let fresh = ChunkStream::default();
        let stream = self.streams.get(&cid).unwrap_or(&fresh);
        let in_progress = stream.partial.as_ref();

        if stream.msg_count == 0 && in_progress.is_none() && fmt != CHUNK_FMT_0 {
            if cid == CID_PROTOCOL_CONTROL && fmt == CHUNK_FMT_1 {
                tracing::warn!(cid, "Accepting type 1 first chunk on protocol control stream");
            } else {
                return Err(ProtocolError::FirstChunkNotFull { cid, fmt }.into());
            }
        }

        if fmt == CHUNK_FMT_0 && in_progress.is_some() {
            return Err(ProtocolError::UnexpectedChunkStart { cid }.into());
        }

        let mut header_len = basic_len + MESSAGE_HEADER_SIZE[fmt as usize];
        if buf.len() < header_len {
            return Ok(None);
        }

        let mut cursor = &buf[basic_len..header_len];
        let mut header = stream.header;
        header.prefer_cid = cid;
        let mut extended_timestamp = stream.extended_timestamp;

        if fmt <= CHUNK_FMT_2 {
            let field = cursor.get_uint(3) as u32;
            extended_timestamp = field == EXTENDED_TIMESTAMP_THRESHOLD;
            header.timestamp_delta = field;

            if fmt <= CHUNK_FMT_1 {
                let payload_length = cursor.get_uint(3) as u32;
                if let Some(partial) = in_progress {
                    if partial.header.payload_length != payload_length {
                        return Err(ProtocolError::PayloadLengthChanged {
                            cid,
                            expected: partial.header.payload_length,
                            actual: payload_length,
                        }
                        .into());
                    }
                }
                header.payload_length = payload_length;
                header.message_type = cursor.get_u8();
            }

            if fmt == CHUNK_FMT_0 {
                header.stream_id = cursor.get_u32_le();
            }

            if extended_timestamp {
                if buf.len() < header_len + 4 {
                    return Ok(None);
                }
                header.timestamp = (&buf[header_len..header_len + 4]).get_u32();
                header_len += 4;
            } else if fmt == CHUNK_FMT_0 {
                header.timestamp = field;
            } else {
                header.timestamp = header.timestamp.wrapping_add(field);
            }
        } else if extended_timestamp {
            if buf.len() < header_len + 4 {
                return Ok(None);
            }
            let timestamp = (&buf[header_len..header_len + 4]).get_u32();
            header_len += 4;

            // Continuations repeat the same value; a different one starts a new message
            if timestamp != header.timestamp {
                header.timestamp = timestamp;
            }
        } else if in_progress.is_none() {
            header.timestamp = header.timestamp.wrapping_add(header.timestamp_delta);
        }

        header.timestamp &= TIMESTAMP_MASK;

        if in_progress.is_none() && header.payload_length > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: header.payload_length,
                max: self.max_message_size,
            }
            .into());
        }

        Ok(Some(ChunkHeader {
            fmt,
            cid,
            header,
            extended_timestamp,
            header_len,
        }))
    }

    /// Apply a fully buffered chunk to its chunk stream, handing back the
    /// message if this chunk completed it.
    fn commit(&mut self, chunk: ChunkHeader, data: &[u8]) -> Option<Message> {
        let stream = self.streams.entry(chunk.cid).or_default();
        stream.fmt = chunk.fmt;
        stream.header = chunk.header;
        stream.extended_timestamp = chunk.extended_timestamp;

        let partial = stream.partial.get_or_insert_with(|| PartialMessage {
            header: chunk.header,
            payload: BytesMut::with_capacity(chunk.header.payload_length as usize),
        });
        partial.payload.put_slice(data);

        if partial.size() < partial.header.payload_length {
            return None;
        }

        let partial = stream.partial.take()?;
        stream.msg_count += 1;

        Some(Message {
            header: partial.header,
            payload: partial.payload.freeze(),
        })
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Chunk stream encoder
///
/// Every message goes out as one type 0 chunk followed by type 3
/// continuation chunks.
pub struct ChunkEncoder {
    /// Outgoing chunk size
    chunk_size: u32,
}

impl ChunkEncoder {
    /// Create a new encoder with default chunk size
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the outbound chunk size, after a SetChunkSize has been sent
    pub fn set_chunk_size(&mut self, size: u32) {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
    }

    /// Get current chunk size
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Encode a message into chunks on its preferred chunk stream
    pub fn encode(&self, message: &Message, buf: &mut BytesMut) {
        let mut header = message.header;
        header.payload_length = message.payload.len() as u32;
        header.timestamp &= TIMESTAMP_MASK;

        let cid = header.prefer_cid;
        let chunk_size = self.chunk_size as usize;
        let mut payload: Bytes = message.payload.clone();

        write_chunk_header(CHUNK_FMT_0, cid, &header, buf);
        let first = payload.len().min(chunk_size);
        buf.put_slice(&payload.split_to(first));

        while !payload.is_empty() {
            write_chunk_header(CHUNK_FMT_3, cid, &header, buf);
            let len = payload.len().min(chunk_size);
            buf.put_slice(&payload.split_to(len));
        }
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}
