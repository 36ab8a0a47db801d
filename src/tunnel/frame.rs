//! Frame layout for the tunnel protocol
//!
//! Frame format:
//! ```text
//! +-------+-------+-------+-------+-------+-------+----------------+
//! | noise | noise |  pad  |   A   |   B   |   C   |    Payload     |
//! +-------+-------+-------+-------+-------+-------+----------------+
//!
//! pad even:  A B = length (u16, big endian)   C = filler
//! pad odd:   A   = filler   B C = length (u16, big endian)
//! ```
//!
//! Noise, pad and filler are fresh random bytes on every frame. The pad byte
//! never moves, so its parity tells the reader where the length sits. Frames
//! are read off the stream by [`recv_message`](super::recv_message), which
//! parses the header with [`FrameHeader::parse`] and then reads the payload.

use super::TunnelError;
use crate::crypto::random_bytes;
use bytes::{BufMut, Bytes, BytesMut};

/// Frame header size in bytes
pub const FRAME_HEADER_SIZE: usize = 6;

/// Maximum payload size (bounded by the 16-bit length field)
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Offset of the pad byte
const PAD_OFFSET: usize = 2;

/// Placement of the length and filler fields after the pad byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    /// `pad, len_hi, len_lo, filler`
    LengthFirst,
    /// `pad, filler, len_hi, len_lo`
    FillerFirst,
}

impl FieldOrder {
    /// Derive the order from the pad byte's parity
    pub fn from_pad(pad: u8) -> Self {
        if pad & 1 == 0 {
            FieldOrder::LengthFirst
        } else {
            FieldOrder::FillerFirst
        }
    }

    fn length_offset(self) -> usize {
        match self {
            FieldOrder::LengthFirst => PAD_OFFSET + 1,
            FieldOrder::FillerFirst => PAD_OFFSET + 2,
        }
    }

    fn filler_offset(self) -> usize {
        match self {
            FieldOrder::LengthFirst => PAD_OFFSET + 3,
            FieldOrder::FillerFirst => PAD_OFFSET + 1,
        }
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Leading noise, ignored by the reader
    pub noise: [u8; 2],
    /// Pad byte; its parity selects the field order
    pub pad: u8,
    /// Filler byte, ignored by the reader
    pub filler: u8,
    /// Payload length
    pub length: u16,
}

impl FrameHeader {
    /// Header for a payload of `length` bytes with fresh random fields
    pub fn random(length: u16) -> Self {
        let mut rand = [0u8; 4];
        random_bytes(&mut rand);

        Self {
            noise: [rand[0], rand[1]],
            pad: rand[2],
            filler: rand[3],
            length,
        }
    }

    /// Field order this header is laid out in
    pub fn order(&self) -> FieldOrder {
        FieldOrder::from_pad(self.pad)
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let order = self.order();
        let mut buf = [0u8; FRAME_HEADER_SIZE];

        buf[..2].copy_from_slice(&self.noise);
        buf[PAD_OFFSET] = self.pad;

        let len_at = order.length_offset();
        buf[len_at..len_at + 2].copy_from_slice(&self.length.to_be_bytes());
        buf[order.filler_offset()] = self.filler;

        buf
    }

    /// Parse a header
    pub fn parse(buf: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let pad = buf[PAD_OFFSET];
        let order = FieldOrder::from_pad(pad);
        let len_at = order.length_offset();

        Self {
            noise: [buf[0], buf[1]],
            pad,
            filler: buf[order.filler_offset()],
            length: u16::from_be_bytes([buf[len_at], buf[len_at + 1]]),
        }
    }
}

/// A tunnel frame carrying one obfuscated payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Obfuscated payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame around an obfuscated payload
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encode frame to bytes with a random header
    pub fn encode(&self) -> Result<BytesMut, TunnelError> {
        let length = self.checked_len()?;
        Ok(self.encode_with_header(FrameHeader::random(length)))
    }

    /// Encode with a caller-chosen header. `header.length` is overwritten
    /// with the payload length.
    pub(crate) fn encode_with_header(&self, mut header: FrameHeader) -> BytesMut {
        header.length = self.payload.len() as u16;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    fn checked_len(&self) -> Result<u16, TunnelError> {
        u16::try_from(self.payload.len())
            .map_err(|_| TunnelError::FrameTooLarge(self.payload.len(), MAX_PAYLOAD_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pad: u8) -> FrameHeader {
        FrameHeader {
            noise: [0xAA, 0xBB],
            pad,
            filler: 0xCC,
            length: 0,
        }
    }

    fn split(encoded: &[u8]) -> (FrameHeader, &[u8]) {
        let mut raw = [0u8; FRAME_HEADER_SIZE];
        raw.copy_from_slice(&encoded[..FRAME_HEADER_SIZE]);
        (FrameHeader::parse(&raw), &encoded[FRAME_HEADER_SIZE..])
    }

    #[test]
    fn test_frame_encode_parse() {
        let encoded = Frame::new(Bytes::from_static(b"Hello, World!")).encode().unwrap();

        let (parsed, payload) = split(&encoded);
        assert_eq!(parsed.length as usize, payload.len());
        assert_eq!(payload, b"Hello, World!");
    }

    #[test]
    fn test_roundtrip_every_pad_value() {
        let payload = Bytes::from_static(b"payload bytes");
        let frame = Frame::new(payload.clone());

        for pad in 0..=255u8 {
            let encoded = frame.encode_with_header(header(pad));
            let (parsed, rest) = split(&encoded);
            assert_eq!(parsed.pad, pad);
            assert_eq!(parsed.length as usize, payload.len(), "pad {}", pad);
            assert_eq!(rest, &payload[..], "pad {}", pad);
        }
    }

    #[test]
    fn test_even_pad_layout() {
        let frame = Frame::new(vec![0u8; 0x0102]);
        let encoded = frame.encode_with_header(header(0x10));

        assert_eq!(&encoded[..6], &[0xAA, 0xBB, 0x10, 0x01, 0x02, 0xCC]);
    }

    #[test]
    fn test_odd_pad_layout() {
        let frame = Frame::new(vec![0u8; 0x0102]);
        let encoded = frame.encode_with_header(header(0x11));

        assert_eq!(&encoded[..6], &[0xAA, 0xBB, 0x11, 0xCC, 0x01, 0x02]);
    }

    #[test]
    fn test_header_parse() {
        let parsed = FrameHeader::parse(&[1, 2, 7, 9, 0x00, 0x05]);
        assert_eq!(parsed.order(), FieldOrder::FillerFirst);
        assert_eq!(parsed.length, 5);
        assert_eq!(parsed.filler, 9);

        let parsed = FrameHeader::parse(&[1, 2, 8, 0x00, 0x05, 9]);
        assert_eq!(parsed.order(), FieldOrder::LengthFirst);
        assert_eq!(parsed.length, 5);
        assert_eq!(parsed.filler, 9);
    }

    #[test]
    fn test_frame_too_large() {
        let frame = Frame::new(vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        assert!(matches!(
            frame.encode(),
            Err(TunnelError::FrameTooLarge(65536, 65535))
        ));

        let frame = Frame::new(vec![0u8; MAX_PAYLOAD_SIZE]);
        assert_eq!(frame.encode().unwrap().len(), FRAME_HEADER_SIZE + MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_headers_are_randomized() {
        let frame = Frame::new(Bytes::from_static(b"same payload"));
        let headers: Vec<_> = (0..16)
            .map(|_| frame.encode().unwrap()[..FRAME_HEADER_SIZE].to_vec())
            .collect();

        assert!(headers.iter().any(|h| h != &headers[0]));
    }
}
