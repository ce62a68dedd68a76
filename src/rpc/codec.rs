//! Length-prefixed framing over one TCP stream.
//!
//! Each frame is a `u32` big-endian byte count followed by the payload,
//! encoded with the connection's negotiated codec (the handshake frame
//! alone is always JSON). A connection splits into an [`RpcReader`] and an
//! [`RpcWriter`] so the receive loop and senders can run independently.

use super::protocol::{CodecKind, Handshake, Header};

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Upper bound on a single frame; anything larger is treated as a corrupt
/// stream rather than an allocation request.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

pub fn encode<T: Serialize>(kind: CodecKind, value: &T) -> Result<Vec<u8>> {
    match kind {
        CodecKind::Bincode => bincode::serialize(value).context("bincode encode"),
        CodecKind::Json => serde_json::to_vec(value).context("json encode"),
    }
}

pub fn decode<T: DeserializeOwned>(kind: CodecKind, bytes: &[u8]) -> Result<T> {
    match kind {
        CodecKind::Bincode => bincode::deserialize(bytes).context("bincode decode"),
        CodecKind::Json => serde_json::from_slice(bytes).context("json decode"),
    }
}

/// Splits a fresh connection into its framed halves.
pub fn split(stream: TcpStream, kind: CodecKind) -> (RpcReader, RpcWriter) {
    let (read_half, write_half) = stream.into_split();
    (
        RpcReader {
            kind,
            stream: BufReader::new(read_half),
        },
        RpcWriter {
            kind,
            stream: BufWriter::new(write_half),
        },
    )
}

/// Sends the handshake frame on a still-unsplit connection.
pub async fn write_handshake(stream: &mut TcpStream, handshake: &Handshake) -> Result<()> {
    let payload = serde_json::to_vec(handshake).context("handshake encode")?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads the handshake frame on a still-unsplit connection.
pub async fn read_handshake(stream: &mut TcpStream) -> Result<Handshake> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        bail!("handshake frame of {} bytes exceeds the limit", len);
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;
    serde_json::from_slice(&payload).context("handshake decode")
}

pub struct RpcReader {
    kind: CodecKind,
    stream: BufReader<OwnedReadHalf>,
}

impl RpcReader {
    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_BYTES {
            bail!("frame of {} bytes exceeds the limit", len);
        }
        let mut payload = vec![0u8; len as usize];
        self.stream.read_exact(&mut payload).await?;
        Ok(payload)
    }

    pub async fn read_header(&mut self) -> Result<Header> {
        let frame = self.read_frame().await?;
        decode(self.kind, &frame)
    }

    pub async fn read_body<T: DeserializeOwned>(&mut self) -> Result<T> {
        let frame = self.read_frame().await?;
        decode(self.kind, &frame)
    }

    /// Raw body bytes, decoded later by whoever knows the reply type.
    pub async fn read_body_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_frame().await
    }

    /// Consumes and drops a body frame to keep header/body pairing intact.
    pub async fn discard_body(&mut self) -> Result<()> {
        self.read_frame().await?;
        Ok(())
    }
}

pub struct RpcWriter {
    kind: CodecKind,
    stream: BufWriter<OwnedWriteHalf>,
}

impl RpcWriter {
    /// Writes one message (header frame then body frame) and flushes
    /// before returning. A failed write tears the connection down.
    pub async fn write_message<T: Serialize>(&mut self, header: &Header, body: &T) -> Result<()> {
        let header_bytes = encode(self.kind, header)?;
        let body_bytes = encode(self.kind, body)?;

        let mut buf =
            Vec::with_capacity(8 + header_bytes.len() + body_bytes.len());
        buf.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&(body_bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(&body_bytes);

        let result = async {
            self.stream.write_all(&buf).await?;
            self.stream.flush().await?;
            Ok(())
        }
        .await;

        if result.is_err() {
            let _ = self.stream.get_mut().shutdown().await;
        }
        result
    }

    /// Half-closes the connection; the peer's read loop observes EOF.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.flush().await?;
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }
}
