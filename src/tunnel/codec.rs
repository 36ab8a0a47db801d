//! Message I/O over a tunnel stream
//!
//! One message is one or more frames: plaintext is split into chunks of at
//! most [`MAX_CHUNK_SIZE`] bytes, each chunk run through the mix cipher and
//! framed on its own.

use super::{Frame, FrameHeader, TunnelError, FRAME_HEADER_SIZE, MAX_CHUNK_SIZE, MAX_MESSAGE_SIZE};
use crate::obfuscation::MixCipher;
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Obfuscate, frame and write `data`
pub async fn send_message<W>(writer: &mut W, cipher: &MixCipher, data: &[u8]) -> Result<(), TunnelError>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BytesMut::new();

    if data.is_empty() {
        out.extend_from_slice(&Frame::new(cipher.encrypt(data)?).encode()?);
    }
    for chunk in data.chunks(MAX_CHUNK_SIZE) {
        let frame = Frame::new(cipher.encrypt(chunk)?);
        out.extend_from_slice(&frame.encode()?);
    }

    trace!("Sending {} plaintext bytes as {} wire bytes", data.len(), out.len());
    writer.write_all(&out).await?;
    Ok(())
}

/// Read one frame and return its plaintext.
///
/// `Ok(None)` means the peer closed before sending any byte of a new frame.
/// A close partway through the header or payload is a `ShortRead`.
pub async fn recv_message<R>(reader: &mut R, cipher: &MixCipher) -> Result<Option<Vec<u8>>, TunnelError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; FRAME_HEADER_SIZE];
    let got = read_full(reader, &mut raw).await?;
    if got == 0 {
        return Ok(None);
    }
    if got < FRAME_HEADER_SIZE {
        return Err(TunnelError::ShortRead {
            expected: FRAME_HEADER_SIZE,
            received: got,
        });
    }

    let header = FrameHeader::parse(&raw);
    let mut payload = vec![0u8; header.length as usize];
    let got = read_full(reader, &mut payload).await?;
    if got < payload.len() {
        return Err(TunnelError::ShortRead {
            expected: payload.len(),
            received: got,
        });
    }

    let plaintext = cipher.decrypt_limited(&payload, MAX_MESSAGE_SIZE)?;
    trace!("Received {} wire bytes, {} plaintext bytes", payload.len(), plaintext.len());
    Ok(Some(plaintext))
}

/// Fill `buf` unless EOF comes first; returns how much was filled
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Receiving half of a tunnel leg
pub struct TunnelReader<R> {
    inner: R,
    cipher: Arc<MixCipher>,
}

impl<R: AsyncRead + Unpin> TunnelReader<R> {
    pub fn new(inner: R, cipher: Arc<MixCipher>) -> Self {
        Self { inner, cipher }
    }

    /// Receive the next message, `None` on orderly EOF
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TunnelError> {
        recv_message(&mut self.inner, &self.cipher).await
    }
}

/// Sending half of a tunnel leg
pub struct TunnelWriter<W> {
    inner: W,
    cipher: Arc<MixCipher>,
}

impl<W: AsyncWrite + Unpin> TunnelWriter<W> {
    pub fn new(inner: W, cipher: Arc<MixCipher>) -> Self {
        Self { inner, cipher }
    }

    /// Send one message
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TunnelError> {
        send_message(&mut self.inner, &self.cipher, data).await
    }
}
