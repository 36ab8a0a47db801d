//! Protocol definitions and constants

use crate::obfuscation::PaddingConfig;
use crate::proxy::Reply;
use crate::tunnel::TunnelError;

/// Read buffer for the plaintext legs (10 KB)
pub const BUFFER_SIZE: usize = 10 * 1024;

/// Default key when none is configured
pub const DEFAULT_KEY: &str = "qwer1234";

/// Default local relay (SOCKS5) port
pub const DEFAULT_LOCAL_PORT: u16 = 1080;

/// Default remote relay port
pub const DEFAULT_REMOTE_PORT: u16 = 8324;

/// Answer the remote relay sends after its outbound connect attempt.
///
/// Wire form, before obfuscation: `[status][random padding]`. The padding
/// keeps the message from having a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectReply {
    pub status: Reply,
}

impl ConnectReply {
    pub fn new(status: Reply) -> Self {
        Self { status }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Encode with random padding
    pub fn encode(&self, padding: &PaddingConfig) -> Vec<u8> {
        let mut buf = vec![self.status as u8];
        padding.pad(&mut buf);
        buf
    }

    /// Decode; only the first byte matters
    pub fn decode(buf: &[u8]) -> Result<Self, TunnelError> {
        let status = buf
            .first()
            .ok_or_else(|| TunnelError::CorruptFrame("empty connect reply".to_string()))?;
        Ok(Self::new(Reply::from_u8(*status)))
    }
}
