//! Waiting for a specific packet amid unrelated traffic
//!
//! The publish and play sequences are driven by waiting for one client
//! command at a time. [`Transport::expect_packet`] keeps receiving until a
//! packet of the requested type arrives, dropping everything else, and
//! gives up after a deadline.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};
use crate::protocol::packet::*;
use crate::protocol::transport::Transport;

/// A packet type that can be waited for
pub trait ExpectedPacket: Sized {
    /// Name used in logs
    const NAME: &'static str;

    /// Extract `Self` from a decoded packet, or `None` if it is another type
    fn from_packet(packet: Packet) -> Option<Self>;
}

macro_rules! expected_packet {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl ExpectedPacket for $ty {
                const NAME: &'static str = stringify!($variant);

                fn from_packet(packet: Packet) -> Option<Self> {
                    match packet {
                        Packet::$variant(p) => Some(p),
                        _ => None,
                    }
                }
            }
        )*
    };
}

expected_packet!(
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

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Receive until a `T` arrives or `timeout` elapses.
    ///
    /// Packets of other types and messages whose AMF payload fails to
    /// decode are dropped. Framing and I/O errors end the wait.
    pub async fn expect_packet<T: ExpectedPacket>(&mut self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self.wait_for::<T>()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(expected = T::NAME, ?timeout, "Timed out waiting for packet");
                Err(Error::Timeout)
            }
        }
    }

    async fn wait_for<T: ExpectedPacket>(&mut self) -> Result<T> {
        loop {
            let message = self.recv_message().await?;
            match Packet::decode(&message) {
                Ok(Some(packet)) => match T::from_packet(packet) {
                    Some(expected) => return Ok(expected),
                    None => {
                        tracing::trace!(expected = T::NAME, "Skipping unrelated packet");
                    }
                },
                Ok(None) => {}
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(
                        expected = T::NAME,
                        message_type = message.message_type(),
                        error = %e,
                        "Dropping undecodable message"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::{amf0, AmfValue};
    use crate::protocol::chunk::ChunkEncoder;
    use crate::protocol::constants::*;
    use crate::protocol::message::Message;
    use bytes::BytesMut;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    async fn write_packets(io: &mut DuplexStream, packets: &[Packet]) {
        let encoder = ChunkEncoder::new();
        let mut wire = BytesMut::new();
        for packet in packets {
            encoder.encode(&packet.to_message(0), &mut wire);
        }
        io.write_all(&wire).await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_unrelated_packets() {
        let (a, mut peer) = duplex(64 * 1024);
        let mut transport = Transport::new(a);

        write_packets(
            &mut peer,
            &[
                SetChunkSizePacket { chunk_size: 128 }.into(),
                UserControlEvent::SetBufferLength {
                    stream_id: 0,
                    buffer_ms: 3000,
                }
                .into(),
                FmleStartPacket::new(CMD_FC_PUBLISH, 3.0, "key").into(),
            ],
        )
        .await;

        let packet: FmleStartPacket = transport
            .expect_packet(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(packet.transaction_id, 3.0);
        assert!(packet.is_fc_publish());
        assert_eq!(packet.stream_name, "key");
    }

    #[tokio::test]
    async fn test_times_out_without_match() {
        let (a, mut peer) = duplex(64 * 1024);
        let mut transport = Transport::new(a);

        write_packets(&mut peer, &[CreateStreamPacket::new(4.0).into()]).await;

        let result = transport
            .expect_packet::<PublishPacket>(Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_state_survives_timeout() {
        let (a, mut peer) = duplex(64 * 1024);
        let mut transport = Transport::new(a);

        // half a chunk arrives before the deadline
        let publish: Packet = PublishPacket::new("key").into();
        let mut wire = BytesMut::new();
        ChunkEncoder::new().encode(&publish.to_message(1), &mut wire);
        peer.write_all(&wire[..10]).await.unwrap();

        let result = transport
            .expect_packet::<PublishPacket>(Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout)));

        peer.write_all(&wire[10..]).await.unwrap();
        let packet: PublishPacket = transport
            .expect_packet(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(packet.stream_name, "key");
    }

    #[tokio::test]
    async fn test_undecodable_command_is_dropped() {
        let (a, mut peer) = duplex(64 * 1024);
        let mut transport = Transport::new(a);

        // publish with no stream name fails AMF decoding
        let broken = Message::new(
            MSG_COMMAND_AMF0,
            0,
            CID_OVER_STREAM,
            amf0::encode_all(&["publish".into(), 5.0.into(), AmfValue::Null]),
        );
        let mut wire = BytesMut::new();
        ChunkEncoder::new().encode(&broken, &mut wire);
        peer.write_all(&wire).await.unwrap();
        write_packets(&mut peer, &[PublishPacket::new("good").into()]).await;

        let packet: PublishPacket = transport
            .expect_packet(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(packet.stream_name, "good");
    }

    #[tokio::test]
    async fn test_connection_close_ends_wait() {
        let (a, peer) = duplex(1024);
        let mut transport = Transport::new(a);
        drop(peer);

        let result = transport
            .expect_packet::<ConnectAppPacket>(Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
