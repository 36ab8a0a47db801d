//! Key material and randomness
//!
//! This module provides:
//! - Shared-secret salt derivation (MD5 of the key string)
//! - Secure random number generation for frame headers and padding
//!
//! Nothing here is authenticated encryption. The salt only keys the XOR
//! stream of the obfuscation codec.

mod secret;

pub use secret::{SharedSecret, SALT_LEN};

use ring::rand::{SecureRandom, SystemRandom};

/// Generate cryptographically secure random bytes
///
/// # Panics
///
/// Panics if the operating system random source is unavailable.
pub fn random_bytes(buf: &mut [u8]) {
    let rng = SystemRandom::new();
    rng.fill(buf).expect("Failed to generate random bytes");
}

/// Generate a single random byte
pub fn random_u8() -> u8 {
    let mut buf = [0u8; 1];
    random_bytes(&mut buf);
    buf[0]
}

/// Pick a random value in `min..=max`
pub fn random_range(min: usize, max: usize) -> usize {
    if max <= min {
        return min;
    }

    let mut buf = [0u8; 8];
    random_bytes(&mut buf);
    let span = (max - min) as u64 + 1;
    min + (u64::from_be_bytes(buf) % span) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let mut buf1 = [0u8; 32];
        let mut buf2 = [0u8; 32];
        random_bytes(&mut buf1);
        random_bytes(&mut buf2);
        assert_ne!(buf1, buf2);
    }

    #[test]
    fn test_random_range_bounds() {
        for _ in 0..1000 {
            let n = random_range(16, 32);
            assert!((16..=32).contains(&n));
        }
        assert_eq!(random_range(7, 7), 7);
        assert_eq!(random_range(9, 3), 9);
    }
}
