//! RTMP handshake implementation
//!
//! The RTMP handshake consists of three phases:
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |------- C0 (1 byte: version) --------->|
//!   |------- C1 (1536 bytes: time+random) ->|
//!   |                                        |
//!   |<------ S0 (1 byte: version) ----------|
//!   |<------ S1 (1536 bytes: time+random) --|
//!   |<------ S2 (1536 bytes: echo C1) ------|
//!   |                                        |
//!   |------- C2 (1536 bytes: echo S1) ----->|
//!   |                                        |
//!   |          [Handshake Complete]          |
//! ```
//!
//! Only the plain-text ("simple") handshake is implemented: S1 carries no
//! digest and C2 is checked against S1 for logging only.
//!
//! Reference: RTMP Specification Section 5.2

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HandshakeError, Result};
use crate::protocol::constants::{HANDSHAKE_SIZE, RTMP_VERSION};

/// C0 + C1
pub const C0C1_SIZE: usize = 1 + HANDSHAKE_SIZE;

/// S0 + S1 + S2
pub const S0S1S2_SIZE: usize = 1 + HANDSHAKE_SIZE * 2;

/// C2
pub const C2_SIZE: usize = HANDSHAKE_SIZE;

/// Server handshake state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the client's C0C1
    AwaitingC0C1,
    /// S0S1S2 sent, waiting for C2
    AwaitingC2,
    /// Handshake bytes exchanged; chunk traffic may flow
    Ready,
    Failed(HandshakeError),
}

/// Server-side handshake state machine
///
/// Pure byte transformation; [`perform_server_handshake`] drives it over a
/// socket.
#[derive(Debug)]
pub struct ServerHandshake {
    state: HandshakeState,
    /// The S1 we sent, kept to check C2
    s1: Option<Box<[u8; HANDSHAKE_SIZE]>>,
    c2_matched: Option<bool>,
}

impl ServerHandshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::AwaitingC0C1,
            s1: None,
            c2_matched: None,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Check if handshake is complete
    pub fn is_done(&self) -> bool {
        self.state == HandshakeState::Ready
    }

    /// Whether the client's C2 echoed our S1 exactly
    pub fn c2_matched(&self) -> Option<bool> {
        self.c2_matched
    }

    /// Bytes that must be read before the next transition
    pub fn bytes_needed(&self) -> usize {
        match self.state {
            HandshakeState::AwaitingC0C1 => C0C1_SIZE,
            HandshakeState::AwaitingC2 => C2_SIZE,
            HandshakeState::Ready | HandshakeState::Failed(_) => 0,
        }
    }

    /// Consume C0C1 and produce S0S1S2
    pub fn process_c0c1(&mut self, c0c1: &[u8; C0C1_SIZE]) -> Result<Bytes> {
        let version = c0c1[0];
        if version != RTMP_VERSION {
            let err = HandshakeError::UnsupportedVersion(version);
            self.state = HandshakeState::Failed(err.clone());
            return Err(err.into());
        }

        let s1 = generate_s1();

        let mut response = BytesMut::with_capacity(S0S1S2_SIZE);
        response.put_u8(RTMP_VERSION);
        response.put_slice(&s1[..]);
        // S2 echoes C1 verbatim
        response.put_slice(&c0c1[1..]);

        self.s1 = Some(s1);
        self.state = HandshakeState::AwaitingC2;
        Ok(response.freeze())
    }

    /// Consume C2. A C2 that does not echo S1 is tolerated.
    pub fn process_c2(&mut self, c2: &[u8; C2_SIZE]) {
        let matched = self.s1.as_deref().is_some_and(|s1| s1[..] == c2[..]);
        if !matched {
            tracing::warn!("Handshake C2 does not echo S1, continuing");
        }
        self.c2_matched = Some(matched);
        self.state = HandshakeState::Ready;
    }
}

impl Default for ServerHandshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the plain server handshake over `io`.
///
/// Reads exactly 1537 bytes of C0C1, writes 3073 bytes of S0S1S2, then
/// reads exactly 1536 bytes of C2.
pub async fn perform_server_handshake<S>(io: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = ServerHandshake::new();

    let mut c0c1 = [0u8; C0C1_SIZE];
    io.read_exact(&mut c0c1).await?;

    let s0s1s2 = handshake.process_c0c1(&c0c1)?;
    io.write_all(&s0s1s2).await?;
    io.flush().await?;

    let mut c2 = [0u8; C2_SIZE];
    io.read_exact(&mut c2).await?;
    handshake.process_c2(&c2);

    tracing::debug!(c2_matched = ?handshake.c2_matched(), "Handshake complete");
    Ok(())
}

/// Generate S1
///
/// Format (1536 bytes):
/// - Bytes 0-3: Unix time in seconds (little-endian)
/// - Bytes 4-7: Zero
/// - Bytes 8-1535: Random data
fn generate_s1() -> Box<[u8; HANDSHAKE_SIZE]> {
    let mut packet = Box::new([0u8; HANDSHAKE_SIZE]);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    packet[0..4].copy_from_slice(&now.to_le_bytes());

    rand::rng().fill_bytes(&mut packet[8..]);

    packet
}
