//! Client-facing proxy protocol
//!
//! Provides:
//! - SOCKS5 address records, shared with the tunnel's connect message
//! - The SOCKS5 CONNECT handshake (no-auth only)

mod address;
mod socks5;

pub use address::{Address, AddressError, AddressType};
pub use socks5::{
    make_reply, send_failure, AuthMethod, Command, HandshakeState, Reply, Socks5Handshake,
    SOCKS_VERSION,
};

use thiserror::Error;

/// Proxy errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SOCKS version: {0}")]
    InvalidSocksVersion(u8),

    #[error("Unsupported command: {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("Address type not supported: {0:#04x}")]
    UnsupportedAddressType(u8),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Failed to connect to {target}: {reply:?}")]
    PeerConnectFailed { target: String, reply: Reply },
}
