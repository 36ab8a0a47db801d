//! Random padding for anti-fingerprinting

use crate::crypto::{random_bytes, random_range};

/// Padding configuration
///
/// Control messages such as the tunnel connect reply would otherwise have a
/// constant size on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingConfig {
    /// Minimum padding to add
    pub min_padding: usize,
    /// Maximum padding to add (inclusive)
    pub max_padding: usize,
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            min_padding: 16,
            max_padding: 32,
        }
    }
}

impl PaddingConfig {
    /// No padding at all
    pub fn none() -> Self {
        Self {
            min_padding: 0,
            max_padding: 0,
        }
    }

    /// Pick a padding length for the next message
    pub fn calculate_padding(&self) -> usize {
        random_range(self.min_padding, self.max_padding)
    }

    /// Generate random padding bytes
    pub fn generate_padding(&self, len: usize) -> Vec<u8> {
        let mut padding = vec![0u8; len];
        random_bytes(&mut padding);
        padding
    }

    /// Append a freshly sized run of random bytes to `buf`
    pub fn pad(&self, buf: &mut Vec<u8>) {
        let len = self.calculate_padding();
        buf.extend_from_slice(&self.generate_padding(len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range() {
        let config = PaddingConfig::default();
        for _ in 0..200 {
            let n = config.calculate_padding();
            assert!((16..=32).contains(&n));
        }
    }

    #[test]
    fn test_no_padding() {
        let config = PaddingConfig::none();
        let mut buf = vec![0x00];
        config.pad(&mut buf);
        assert_eq!(buf, vec![0x00]);
    }

    #[test]
    fn test_pad_appends() {
        let config = PaddingConfig {
            min_padding: 4,
            max_padding: 4,
        };
        let mut buf = vec![0x01];
        config.pad(&mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], 0x01);
    }
}
