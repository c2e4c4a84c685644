//! Async FLAP framing over a TCP stream, split into a reader and a writer
//! half. The writer owns the outbound sequence counter.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use parlor_shared::wire::flap::{FlapChannel, FlapFrame, FlapSignonFrame, FLAP_HEADER_LEN};
use parlor_shared::wire::tlv::TlvBlock;
use parlor_shared::wire::SnacMessage;

use crate::error::{Result, ServerError};

pub struct FlapReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FlapReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read one frame. A short read inside a frame is a fatal protocol
    /// error; EOF on a frame boundary maps to `ConnectionClosed`.
    pub async fn read_frame(&mut self) -> Result<FlapFrame> {
        let mut hdr = [0u8; FLAP_HEADER_LEN];
        match self.inner.read_exact(&mut hdr).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ServerError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }
        let (channel, sequence, payload_len) = FlapFrame::parse_header(hdr)?;
        let mut payload = vec![0u8; payload_len as usize];
        self.inner.read_exact(&mut payload).await?;
        Ok(FlapFrame {
            channel,
            sequence,
            payload,
        })
    }
}

pub struct FlapWriter<W> {
    inner: W,
    sequence: u16,
}

impl<W: AsyncWrite + Unpin> FlapWriter<W> {
    pub fn new(inner: W, start_sequence: u16) -> Self {
        Self {
            inner,
            sequence: start_sequence,
        }
    }

    async fn write_frame(&mut self, channel: FlapChannel, payload: &[u8]) -> Result<()> {
        let frame = FlapFrame::new(channel, self.sequence, payload.to_vec());
        self.sequence = self.sequence.wrapping_add(1);
        let mut buf = Vec::with_capacity(FLAP_HEADER_LEN + payload.len());
        frame.encode(&mut buf);
        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn write_signon(&mut self, signon: &FlapSignonFrame) -> Result<()> {
        let mut payload = Vec::new();
        signon.encode(&mut payload);
        self.write_frame(FlapChannel::Signon, &payload).await
    }

    pub async fn write_snac(&mut self, msg: &SnacMessage) -> Result<()> {
        self.write_frame(FlapChannel::Data, &msg.encode()).await
    }

    /// Channel-4 frame delivering login errors or a clean goodbye.
    pub async fn write_signoff(&mut self, tlvs: &TlvBlock) -> Result<()> {
        let mut payload = Vec::new();
        tlvs.encode_rest(&mut payload);
        self.write_frame(FlapChannel::Signoff, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::wire::snac::{foodgroup, SnacFrame};

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FlapWriter::new(server, 100);
        let mut reader = FlapReader::new(client);

        let msg = SnacMessage::new(SnacFrame::new(foodgroup::BUDDY, 0x0B), vec![1, 2, 3]);
        writer.write_snac(&msg).await.unwrap();

        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame.channel, FlapChannel::Data);
        assert_eq!(frame.sequence, 100);
        assert_eq!(frame.payload, msg.encode());
    }

    #[tokio::test]
    async fn test_sequence_increments_per_frame() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FlapWriter::new(server, u16::MAX);
        let mut reader = FlapReader::new(client);

        writer.write_signon(&FlapSignonFrame::default()).await.unwrap();
        writer.write_signoff(&TlvBlock::default()).await.unwrap();

        // wraps modulo 2^16
        assert_eq!(reader.read_frame().await.unwrap().sequence, u16::MAX);
        assert_eq!(reader.read_frame().await.unwrap().sequence, 0);
    }

    #[tokio::test]
    async fn test_eof_on_boundary_is_connection_closed() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let mut reader = FlapReader::new(client);
        assert!(matches!(
            reader.read_frame().await,
            Err(ServerError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_fatal() {
        let (client, mut server) = tokio::io::duplex(1024);
        // header promises 10 payload bytes but only 2 arrive before EOF
        tokio::io::AsyncWriteExt::write_all(&mut server, &[0x2A, 2, 0, 0, 0, 10, 1, 2])
            .await
            .unwrap();
        drop(server);

        let mut reader = FlapReader::new(client);
        assert!(reader.read_frame().await.is_err());
    }
}
