//! Unified error types for the RTMP engine

use std::fmt;
use std::io;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all RTMP operations
#[derive(Debug)]
pub enum Error {
    /// I/O error during network operations
    Io(io::Error),
    /// RTMP chunk framing or packet violation
    Protocol(ProtocolError),
    /// AMF0 encoding/decoding error
    Amf(AmfError),
    /// Handshake failure
    Handshake(HandshakeError),
    /// Connection rejected by peer or handler
    Rejected(String),
    /// Operation timed out
    Timeout,
    /// Connection was closed
    ConnectionClosed,
    /// Invalid configuration
    Config(String),
}

impl Error {
    /// Whether the error leaves the connection unusable.
    ///
    /// AMF decode failures only spoil the message that carried them.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Amf(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Handshake(e) => write!(f, "Handshake error: {}", e),
            Error::Rejected(msg) => write!(f, "Connection rejected: {}", msg),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Amf(e) => Some(e),
            Error::Handshake(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return Error::ConnectionClosed;
        }
        Error::Io(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<AmfError> for Error {
    fn from(err: AmfError) -> Self {
        Error::Amf(err)
    }
}

impl From<HandshakeError> for Error {
    fn from(err: HandshakeError) -> Self {
        Error::Handshake(err)
    }
}

/// Chunk framing and packet-level errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The first chunk seen on a chunk stream did not carry a full header
    FirstChunkNotFull { cid: u32, fmt: u8 },
    /// A type 0 chunk arrived while a message was still being reassembled
    UnexpectedChunkStart { cid: u32 },
    /// The payload length changed in the middle of a message
    PayloadLengthChanged { cid: u32, expected: u32, actual: u32 },
    /// Peer announced a chunk size outside the accepted range
    InvalidChunkSize(u32),
    /// A control message payload was shorter than its fixed layout
    TruncatedPayload { message_type: u8, len: usize },
    MessageTooLarge { size: u32, max: u32 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::FirstChunkNotFull { cid, fmt: chunk_fmt } => write!(
                f,
                "First chunk on chunk stream {} must be type 0, got type {}",
                cid, chunk_fmt
            ),
            ProtocolError::UnexpectedChunkStart { cid } => write!(
                f,
                "Unexpected chunk start: type 0 chunk on chunk stream {} while a message is in progress",
                cid
            ),
            ProtocolError::PayloadLengthChanged {
                cid,
                expected,
                actual,
            } => write!(
                f,
                "Payload length changed on chunk stream {}: expected {}, got {}",
                cid, expected, actual
            ),
            ProtocolError::InvalidChunkSize(size) => write!(f, "Invalid chunk size: {}", size),
            ProtocolError::TruncatedPayload { message_type, len } => write!(
                f,
                "Truncated payload for message type {}: {} bytes",
                message_type, len
            ),
            ProtocolError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// AMF0 encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfError {
    UnknownMarker(u8),
    /// A typed read found a different marker than required
    UnexpectedMarker { expected: u8, found: u8 },
    UnexpectedEof,
    InvalidUtf8,
    /// A primitive string value had zero length
    EmptyString,
    NestingTooDeep,
    InvalidObjectEnd,
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnknownMarker(m) => write!(f, "Unknown AMF marker: 0x{:02x}", m),
            AmfError::UnexpectedMarker { expected, found } => write!(
                f,
                "Unexpected AMF marker: expected 0x{:02x}, found 0x{:02x}",
                expected, found
            ),
            AmfError::UnexpectedEof => write!(f, "Unexpected end of AMF data"),
            AmfError::InvalidUtf8 => write!(f, "Invalid UTF-8 in AMF string"),
            AmfError::EmptyString => write!(f, "Empty AMF string value"),
            AmfError::NestingTooDeep => write!(f, "AMF nesting too deep"),
            AmfError::InvalidObjectEnd => write!(f, "Invalid object end marker"),
        }
    }
}

impl std::error::Error for AmfError {}

/// Handshake-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// C0 carried something other than the plain-text version byte
    UnsupportedVersion(u8),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::UnsupportedVersion(v) => {
                write!(f, "Unsupported handshake version: {}", v)
            }
        }
    }
}

impl std::error::Error for HandshakeError {}
