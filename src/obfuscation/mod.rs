//! Traffic obfuscation layer
//!
//! Provides:
//! - The mix cipher: a salt-keyed XOR stream followed by zlib compression
//! - Random padding for fixed-shape control messages
//!
//! ## Not a security boundary
//!
//! The codec hides payloads from casual inspection and keeps tunnel bytes
//! from looking like plaintext SOCKS5. It carries no integrity tag, so
//! tampering and replay go undetected.

mod cipher;
mod padding;

pub use cipher::MixCipher;
pub use padding::PaddingConfig;

use thiserror::Error;

/// Obfuscation codec errors
#[derive(Debug, Error)]
pub enum ObfuscationError {
    #[error("Compression failed: {0}")]
    Compress(#[from] std::io::Error),

    #[error("Corrupt payload: {0}")]
    Corrupt(String),

    #[error("Payload expands beyond {0} bytes")]
    TooLarge(usize),
}
