//! Shared secret handling

use std::fmt;

/// Length of the derived salt (hex-encoded MD5 digest)
pub const SALT_LEN: usize = 32;

/// The key both relay halves are started with, reduced to a fixed salt.
///
/// The salt is the lowercase hex string of `MD5(key)`, taken as its ASCII
/// bytes rather than the 16 raw digest bytes. Peers interoperate iff they
/// were given the same key.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    salt: [u8; SALT_LEN],
}

impl SharedSecret {
    /// Derive the salt from a key string
    pub fn new(key: &str) -> Self {
        let digest = format!("{:x}", md5::compute(key.as_bytes()));

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(digest.as_bytes());

        Self { salt }
    }

    /// Get the derived salt
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}
