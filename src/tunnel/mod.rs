//! Tunnel layer - obfuscated channel between the local and remote relay
//!
//! Provides:
//! - Frame encoding and header parsing with a randomized header layout
//! - Message reader/writer pairs that run the mix cipher over each frame

mod codec;
mod frame;

pub use codec::{recv_message, send_message, TunnelReader, TunnelWriter};
pub use frame::{FieldOrder, Frame, FrameHeader, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE};

use crate::obfuscation::ObfuscationError;
use thiserror::Error;

/// Tunnel layer errors
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Frame too large: {0} > {1}")]
    FrameTooLarge(usize, usize),

    #[error("Short read: expected {expected} bytes, got {received}")]
    ShortRead { expected: usize, received: usize },

    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ObfuscationError> for TunnelError {
    fn from(e: ObfuscationError) -> Self {
        TunnelError::CorruptFrame(e.to_string())
    }
}

/// Largest plaintext chunk obfuscated into a single frame. Compressing
/// 32 KiB never outgrows the 16-bit length field.
pub const MAX_CHUNK_SIZE: usize = 32 * 1024;

/// Largest plaintext a single received frame may expand to (1 MiB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
