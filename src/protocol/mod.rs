//! RTMP wire protocol implementation
//!
//! This module handles the low-level protocol details:
//! - Handshake (C0C1/S0S1S2/C2 exchange)
//! - Chunk stream multiplexing and message reassembly
//! - Command and control packet encoding
//! - Waiting for specific client commands

pub mod chunk;
pub mod constants;
pub mod correlator;
pub mod handshake;
pub mod message;
pub mod packet;
pub mod quirks;
pub mod transport;

pub use chunk::{ChunkDecoder, ChunkEncoder, ChunkStream};
pub use correlator::ExpectedPacket;
pub use handshake::{perform_server_handshake, ServerHandshake};
pub use message::{Message, MessageHeader};
pub use packet::{Packet, UserControlEvent};
pub use transport::Transport;
