//! Chunk-framed message transport over one connection
//!
//! `Transport` owns the socket, the inbound and outbound chunk state and
//! the acknowledgement window. Nothing in it is shared with other
//! connections.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::chunk::{ChunkDecoder, ChunkEncoder};
use crate::protocol::constants::*;
use crate::protocol::handshake::perform_server_handshake;
use crate::protocol::message::Message;
use crate::protocol::packet::{AcknowledgementPacket, Packet};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Tracks when an Acknowledgement is owed to the peer
#[derive(Debug, Default, Clone, Copy)]
struct AckWindow {
    /// Window announced by the peer, 0 until one arrives
    size: u32,
    /// Byte count at the last acknowledgement
    acked: u64,
}

impl AckWindow {
    fn is_due(&self, received: u64) -> bool {
        self.size > 0 && received - self.acked >= self.size as u64
    }
}

/// Message-level transport for a single RTMP connection
pub struct Transport<S> {
    stream: BufWriter<S>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    decoder: ChunkDecoder,
    encoder: ChunkEncoder,
    bytes_received: u64,
    ack_window: AckWindow,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self::with_capacity(stream, DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(stream: S, read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self {
            stream: BufWriter::with_capacity(write_buffer_size, stream),
            read_buf: BytesMut::with_capacity(read_buffer_size),
            write_buf: BytesMut::with_capacity(write_buffer_size),
            decoder: ChunkDecoder::new(),
            encoder: ChunkEncoder::new(),
            bytes_received: 0,
            ack_window: AckWindow::default(),
        }
    }

    /// Run the plain server handshake; must precede any chunk traffic
    pub async fn server_handshake(&mut self) -> Result<()> {
        perform_server_handshake(&mut self.stream).await
    }

    /// Inbound chunk size, as last announced by the peer
    pub fn in_chunk_size(&self) -> u32 {
        self.decoder.chunk_size()
    }

    /// Outbound chunk size, as last announced to the peer
    pub fn out_chunk_size(&self) -> u32 {
        self.encoder.chunk_size()
    }

    /// Total bytes read after the handshake
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Receive the next complete message.
    ///
    /// Protocol control messages that change framing state (Set Chunk
    /// Size, Abort, Window Acknowledgement Size) take effect here, before
    /// the message is returned.
    pub async fn recv_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = self.decoder.decode(&mut self.read_buf)? {
                self.apply_control(&message)?;
                return Ok(message);
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }

            self.bytes_received += n as u64;
            if self.ack_window.is_due(self.bytes_received) {
                self.send_acknowledgement().await?;
            }
        }
    }

    /// Receive the next message along with its decoded packet, if any
    pub async fn recv_packet(&mut self) -> Result<(Message, Option<Packet>)> {
        let message = self.recv_message().await?;
        let packet = Packet::decode(&message)?;
        Ok((message, packet))
    }

    /// Chunk and write `message` on `stream_id`, then flush
    pub async fn send_message(&mut self, mut message: Message, stream_id: u32) -> Result<()> {
        message.header.stream_id = stream_id;

        self.write_buf.clear();
        self.encoder.encode(&message, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Encode and send `packet` on `stream_id`.
    ///
    /// A Set Chunk Size switches the outbound chunk size once it is written.
    pub async fn send_packet(&mut self, packet: &Packet, stream_id: u32) -> Result<()> {
        self.send_message(packet.to_message(stream_id), stream_id)
            .await?;

        if let Packet::SetChunkSize(p) = packet {
            self.encoder.set_chunk_size(p.chunk_size);
            tracing::debug!(chunk_size = p.chunk_size, "Outbound chunk size changed");
        }
        Ok(())
    }

    fn apply_control(&mut self, message: &Message) -> Result<()> {
        let header = &message.header;
        let mut payload = message.payload.clone();

        if header.is_set_chunk_size() {
            if let Some(Packet::SetChunkSize(p)) = Packet::decode(message)? {
                self.decoder.set_chunk_size(p.chunk_size)?;
                tracing::debug!(chunk_size = p.chunk_size, "Peer set chunk size");
            }
        } else if header.is_window_ack_size() {
            if let Some(Packet::SetWindowAckSize(p)) = Packet::decode(message)? {
                self.ack_window.size = p.ack_window_size;
                tracing::debug!(window = p.ack_window_size, "Peer set ack window");
            }
        } else if header.is_abort() {
            if payload.remaining() < 4 {
                return Err(ProtocolError::TruncatedPayload {
                    message_type: MSG_ABORT,
                    len: payload.remaining(),
                }
                .into());
            }
            let cid = payload.get_u32();
            self.decoder.abort(cid);
            tracing::debug!(cid, "Peer aborted message");
        }
        Ok(())
    }

    async fn send_acknowledgement(&mut self) -> Result<()> {
        let ack = Packet::Acknowledgement(AcknowledgementPacket {
            sequence_number: self.bytes_received as u32,
        });
        self.send_packet(&ack, 0).await?;
        self.ack_window.acked = self.bytes_received;
        tracing::trace!(bytes = self.bytes_received, "Sent acknowledgement");
        Ok(())
    }
}
