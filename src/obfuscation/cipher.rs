//! Salted XOR stream combined with zlib compression

use super::ObfuscationError;
use crate::crypto::SharedSecret;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Output growth step while inflating
const INFLATE_STEP: usize = 16 * 1024;

/// Symmetric obfuscation codec shared by both relay halves.
///
/// Every call starts the XOR stream at salt offset 0; there is no keystream
/// state carried between messages.
#[derive(Debug, Clone)]
pub struct MixCipher {
    secret: SharedSecret,
}

impl MixCipher {
    /// Create a cipher from the shared key string
    pub fn new(key: &str) -> Self {
        Self {
            secret: SharedSecret::new(key),
        }
    }

    /// XOR `data` in place with the cycled salt
    fn mix(&self, data: &mut [u8]) {
        let salt = self.secret.salt();
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= salt[i % salt.len()];
        }
    }

    /// Turn plaintext into wire bytes: XOR, then compress
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, ObfuscationError> {
        let mut mixed = plaintext.to_vec();
        self.mix(&mut mixed);

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(mixed.len() + 16), Compression::default());
        encoder.write_all(&mixed)?;
        Ok(encoder.finish()?)
    }

    /// Turn wire bytes back into plaintext: decompress, then XOR
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, ObfuscationError> {
        self.decrypt_limited(data, usize::MAX)
    }

    /// Like [`decrypt`](Self::decrypt), but fail once the plaintext would
    /// exceed `limit` bytes
    pub fn decrypt_limited(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, ObfuscationError> {
        let mut mixed = inflate(data, limit)?;
        self.mix(&mut mixed);
        Ok(mixed)
    }
}

/// Inflate a complete zlib stream. Input that runs out before the stream's
/// end is corrupt, not short.
fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>, ObfuscationError> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).min(INFLATE_STEP).max(64));

    loop {
        if out.len() == out.capacity() {
            out.reserve_exact(INFLATE_STEP);
        }

        let consumed = inflater.total_in() as usize;
        let before_out = inflater.total_out();

        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| ObfuscationError::Corrupt(e.to_string()))?;

        if out.len() > limit {
            return Err(ObfuscationError::TooLarge(limit));
        }

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                // With output space to spare, no progress means the input is
                // used up
                let stalled = inflater.total_in() as usize == consumed && inflater.total_out() == before_out;
                if stalled && out.len() < out.capacity() {
                    return Err(ObfuscationError::Corrupt("truncated zlib stream".to_string()));
                }
            }
        }
    }
}
