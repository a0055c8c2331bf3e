//! `SUPLA`-tagged packet framing over a byte stream.
//!
//! A packet is `[b"SUPLA"][version u8][rr_id u32][call_id u32][data_size
//! u32][data][b"SUPLA"]`, all integers little-endian. The reader buffers
//! until one full packet is present and validates tags, call id and
//! version before handing the payload out; header fields are inspected as
//! soon as the 18-byte prologue arrives, before the payload is complete.
//!
//! Send and receive halves are split so a connection's reader loop and
//! event loop can work the same socket concurrently: the sender serialises
//! writers behind an async mutex and stamps packet numbers, the reader is
//! exclusively owned and cancel-safe (a cancelled `recv` leaves buffered
//! bytes in place).

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{calls::Call, errors::NetworkError, PROTO_VERSION, PROTO_VERSION_MIN};

/// Start and end tag of every packet.
pub const TAG: [u8; 5] = *b"SUPLA";

/// Byte length of the packet prologue (start tag + header fields).
pub const PROLOGUE_SIZE: usize = TAG.len() + 1 + 4 + 4 + 4;

/// Longest accepted packet payload.
pub const MAX_DATA_SIZE: usize = 10_000;

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Call id naming the payload record type.
    pub call_id: Call,
    /// Encoded payload record; may be empty.
    pub data: Bytes,
}

impl Packet {
    /// Build a packet from a call id and encoded payload.
    pub fn new(call_id: Call, data: impl Into<Bytes>) -> Self {
        Self { call_id, data: data.into() }
    }

    /// Build a payload-less packet.
    pub fn bare(call_id: Call) -> Self {
        Self { call_id, data: Bytes::new() }
    }
}

/// Frame a packet into its full wire form.
pub fn frame(version: u8, rr_id: u32, call_id: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(PROLOGUE_SIZE + data.len() + TAG.len());
    out.extend_from_slice(&TAG);
    out.push(version);
    out.extend_from_slice(&rr_id.to_le_bytes());
    out.extend_from_slice(&call_id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&TAG);
    out
}

/// Receiving half of a packet stream.
#[derive(Debug)]
pub struct PacketReader<R> {
    inner: R,
    buf: BytesMut,
    min_version: u8,
    proto_version: Option<u8>,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    /// Wrap the read half of a transport.
    pub fn new(inner: R) -> Self {
        Self::with_min_version(inner, PROTO_VERSION_MIN)
    }

    /// Wrap with a non-default minimum accepted protocol version.
    pub fn with_min_version(inner: R, min_version: u8) -> Self {
        Self { inner, buf: BytesMut::with_capacity(4096), min_version, proto_version: None }
    }

    /// Protocol version announced by the peer, once a packet arrived.
    pub fn proto_version(&self) -> Option<u8> {
        self.proto_version
    }

    /// Read and validate the next packet.
    ///
    /// Resumes transparently across partial reads; cancelling the future
    /// loses nothing but the time spent waiting.
    pub async fn recv(&mut self) -> Result<Packet, NetworkError> {
        loop {
            if let Some(packet) = self.try_parse()? {
                return Ok(packet);
            }
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(NetworkError::Eof);
            }
        }
    }

    /// Parse one packet out of the buffer, if complete.
    fn try_parse(&mut self) -> Result<Option<Packet>, NetworkError> {
        if self.buf.len() < PROLOGUE_SIZE {
            return Ok(None);
        }

        // Inspect the prologue before the payload has necessarily arrived.
        if self.buf[..TAG.len()] != TAG {
            return Err(NetworkError::BadStartTag);
        }
        let version = self.buf[5];
        let call_raw = u32::from_le_bytes([self.buf[10], self.buf[11], self.buf[12], self.buf[13]]);
        let data_size =
            u32::from_le_bytes([self.buf[14], self.buf[15], self.buf[16], self.buf[17]]) as usize;

        let Some(call_id) = Call::from_u32(call_raw) else {
            return Err(NetworkError::BadHeader);
        };
        if data_size > MAX_DATA_SIZE {
            return Err(NetworkError::BadHeader);
        }
        if version < self.min_version {
            return Err(NetworkError::UnsupportedVersion);
        }

        let total = PROLOGUE_SIZE + data_size + TAG.len();
        if self.buf.len() < total {
            self.buf.reserve(total - self.buf.len());
            return Ok(None);
        }
        if self.buf[PROLOGUE_SIZE + data_size..total] != TAG {
            return Err(NetworkError::BadEndTag);
        }

        self.proto_version = Some(version);

        self.buf.advance(PROLOGUE_SIZE);
        let data = self.buf.split_to(data_size).freeze();
        self.buf.advance(TAG.len());

        Ok(Some(Packet { call_id, data }))
    }
}

#[derive(Debug)]
struct SendHalf<W> {
    inner: W,
    next_rr_id: u32,
}

/// Sending half of a packet stream.
///
/// Cheap to clone; all clones share one write mutex so concurrent senders
/// are serialised and packet numbers stay monotonic.
#[derive(Debug)]
pub struct PacketSender<W> {
    half: Arc<Mutex<SendHalf<W>>>,
}

impl<W> Clone for PacketSender<W> {
    fn clone(&self) -> Self {
        Self { half: Arc::clone(&self.half) }
    }
}

impl<W: AsyncWrite + Unpin> PacketSender<W> {
    /// Wrap the write half of a transport.
    pub fn new(inner: W) -> Self {
        Self { half: Arc::new(Mutex::new(SendHalf { inner, next_rr_id: 1 })) }
    }

    /// Frame and write one packet.
    pub async fn send(&self, packet: &Packet) -> Result<(), NetworkError> {
        let mut half = self.half.lock().await;
        let rr_id = half.next_rr_id;
        half.next_rr_id = half.next_rr_id.wrapping_add(1);
        let wire = frame(PROTO_VERSION, rr_id, packet.call_id.to_u32(), &packet.data);
        half.inner.write_all(&wire).await?;
        half.inner.flush().await?;
        Ok(())
    }

    /// Flush and shut the transport down.
    pub async fn shutdown(&self) -> Result<(), NetworkError> {
        let mut half = self.half.lock().await;
        half.inner.shutdown().await?;
        Ok(())
    }
}

/// A bidirectional packet stream over one transport.
pub struct PacketStream<R, W> {
    /// Receiving half.
    pub reader: PacketReader<R>,
    /// Sending half.
    pub sender: PacketSender<W>,
}

impl<R, W> PacketStream<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Build a stream from already-split transport halves.
    pub fn from_halves(read: R, write: W) -> Self {
        Self { reader: PacketReader::new(read), sender: PacketSender::new(write) }
    }

    /// Read and validate the next packet.
    pub async fn recv(&mut self) -> Result<Packet, NetworkError> {
        self.reader.recv().await
    }

    /// Frame and write one packet.
    pub async fn send(&self, packet: &Packet) -> Result<(), NetworkError> {
        self.sender.send(packet).await
    }

    /// Split into independently owned halves.
    pub fn into_split(self) -> (PacketReader<R>, PacketSender<W>) {
        (self.reader, self.sender)
    }
}

impl<S> PacketStream<tokio::io::ReadHalf<S>, tokio::io::WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Split a whole transport and wrap both halves.
    pub fn new(stream: S) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self::from_halves(read, write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Reader;

    fn stream_pair() -> (
        PacketStream<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
        tokio::io::DuplexStream,
    ) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        (PacketStream::new(ours), theirs)
    }

    #[test]
    fn frame_layout() {
        let wire = frame(19, 1, Call::DcsPingServer.to_u32(), b"\x01\x02\x03\x04");
        assert_eq!(
            wire,
            b"SUPLA\x13\x01\x00\x00\x00\x28\x00\x00\x00\x04\x00\x00\x00\x01\x02\x03\x04SUPLA"
        );
    }

    #[test]
    fn prologue_fields_decode_as_a_prefix() {
        // The framer reads header fields off the prologue without the
        // payload; offsets match the wire layout field by field.
        let wire = frame(19, 1, Call::DcsPingServer.to_u32(), b"\x01\x02\x03\x04");
        let mut r = Reader::new(&wire);
        assert_eq!(r.take(5).unwrap(), b"SUPLA");
        assert_eq!(r.position(), 5);
        assert_eq!(r.u8().unwrap(), 19);
        assert_eq!(r.position(), 6);
        assert_eq!(r.u32().unwrap(), 1);
        assert_eq!(r.position(), 10);
        assert_eq!(r.u32().unwrap(), Call::DcsPingServer.to_u32());
        assert_eq!(r.position(), 14);
        assert_eq!(r.u32().unwrap(), 4);
        assert_eq!(r.position(), 18);
    }

    #[tokio::test]
    async fn send_then_recv() {
        let (mut stream, mut peer) = stream_pair();
        // echo everything the stream writes back at it
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match peer.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if peer.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    },
                }
            }
        });

        stream
            .send(&Packet::new(Call::DcsPingServer, Bytes::from_static(b"\x01\x02\x03\x04")))
            .await
            .unwrap();
        let packet = stream.recv().await.unwrap();
        assert_eq!(packet.call_id, Call::DcsPingServer);
        assert_eq!(&packet.data[..], b"\x01\x02\x03\x04");
        assert_eq!(stream.reader.proto_version(), Some(PROTO_VERSION));
    }

    #[tokio::test]
    async fn invalid_start_tag() {
        let (mut stream, mut peer) = stream_pair();
        peer.write_all(b"SPULA").await.unwrap();
        peer.write_all(&[0; 18]).await.unwrap();
        let err = stream.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::BadStartTag));
        assert_eq!(err.to_string(), "invalid data received; incorrect start tag");
    }

    #[tokio::test]
    async fn invalid_header() {
        // valid tag, but call id 0 is not a known call
        let (mut stream, mut peer) = stream_pair();
        peer.write_all(b"SUPLA").await.unwrap();
        peer.write_all(&[0; 18]).await.unwrap();
        let err = stream.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::BadHeader));
        assert_eq!(err.to_string(), "invalid data received; failed to decode header");
    }

    #[tokio::test]
    async fn invalid_version() {
        let (mut stream, mut peer) = stream_pair();
        let wire = frame(0, 42, Call::DcsPingServer.to_u32(), b"\x01\x02\x03\x04");
        peer.write_all(&wire).await.unwrap();
        let err = stream.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::UnsupportedVersion));
        assert_eq!(err.to_string(), "invalid data received; proto version not supported");
    }

    #[tokio::test]
    async fn invalid_end_tag() {
        let (mut stream, mut peer) = stream_pair();
        let mut wire = frame(PROTO_VERSION, 42, Call::DcsPingServer.to_u32(), b"\x01\x02\x03\x04");
        let len = wire.len();
        wire[len - 5..].copy_from_slice(b"SPULA");
        peer.write_all(&wire).await.unwrap();
        let err = stream.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::BadEndTag));
    }

    #[tokio::test]
    async fn partial_delivery_resumes() {
        let (mut stream, mut peer) = stream_pair();
        let wire = frame(PROTO_VERSION, 42, Call::DcsPingServer.to_u32(), b"\x01\x02\x03\x04");

        peer.write_all(&wire[..wire.len() - 4]).await.unwrap();
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(100), stream.recv()).await;
        assert!(pending.is_err(), "recv should wait for the rest of the packet");

        peer.write_all(&wire[wire.len() - 4..]).await.unwrap();
        let packet = stream.recv().await.unwrap();
        assert_eq!(packet.call_id, Call::DcsPingServer);
    }

    #[tokio::test]
    async fn orderly_close_is_eof() {
        let (mut stream, peer) = stream_pair();
        drop(peer);
        let err = stream.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::Eof));
        assert_eq!(err.to_string(), "eof");
    }

    #[tokio::test]
    async fn two_packets_in_one_read() {
        let (mut stream, mut peer) = stream_pair();
        let mut wire = frame(PROTO_VERSION, 1, Call::CsGetNext.to_u32(), b"");
        wire.extend(frame(PROTO_VERSION, 2, Call::DcsPingServer.to_u32(), b"\x01"));
        peer.write_all(&wire).await.unwrap();
        assert_eq!(stream.recv().await.unwrap().call_id, Call::CsGetNext);
        assert_eq!(stream.recv().await.unwrap().call_id, Call::DcsPingServer);
    }
}
