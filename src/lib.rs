//! # Climb
//!
//! A two-hop SOCKS5 relay for getting traffic past inspecting middleboxes.
//!
//! The local relay speaks plain SOCKS5 to applications on the same machine
//! and forwards each CONNECT through an obfuscated tunnel to the remote
//! relay, which opens the real outbound connection.
//!
//! ## Architecture
//!
//! ```text
//!  browser ──SOCKS5──▶ local relay ══tunnel══▶ remote relay ──TCP──▶ destination
//!          ◀─────────              ◀════════               ◀───────
//! ```
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Relay Layer                       │
//! │       (listener, connection handler, stream pump)    │
//! ├─────────────────────────────────────────────────────┤
//! │                    Proxy Layer                       │
//! │          (SOCKS5 handshake, address records)         │
//! ├─────────────────────────────────────────────────────┤
//! │                   Tunnel Layer                       │
//! │        (randomized frame headers, message I/O)       │
//! ├─────────────────────────────────────────────────────┤
//! │                 Obfuscation Layer                    │
//! │        (salted XOR stream + zlib, padding)           │
//! ├─────────────────────────────────────────────────────┤
//! │                  Transport Layer                     │
//! │                (TCP, timeouts)                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The obfuscation is not encryption: there is no integrity protection and
//! the key only derives an XOR salt.

pub mod config;
pub mod crypto;
pub mod obfuscation;
pub mod protocol;
pub mod proxy;
pub mod relay;
pub mod transport;
pub mod tunnel;

pub use config::Config;
pub use relay::{Listener, LocalRelay, RemoteRelay};

use proxy::{AddressError, ProxyError, Reply};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Proxy error: {0}")]
    Proxy(#[from] proxy::ProxyError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] tunnel::TunnelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

impl From<AddressError> for Error {
    fn from(e: AddressError) -> Self {
        Error::Proxy(ProxyError::Address(e))
    }
}

impl Error {
    /// SOCKS5 reply code describing this error to the client
    pub fn reply(&self) -> Reply {
        match self {
            Error::Io(e) | Error::Proxy(ProxyError::Io(e)) => Reply::from_io_error(e),
            Error::Proxy(ProxyError::PeerConnectFailed { reply, .. }) => *reply,
            Error::Proxy(ProxyError::UnsupportedCommand(_)) => Reply::CommandNotSupported,
            Error::Proxy(ProxyError::UnsupportedAddressType(_))
            | Error::Proxy(ProxyError::Address(AddressError::UnsupportedType(_))) => {
                Reply::AddressTypeNotSupported
            }
            Error::Proxy(ProxyError::AuthenticationFailed) => Reply::ConnectionNotAllowed,
            Error::Timeout => Reply::TtlExpired,
            _ => Reply::GeneralFailure,
        }
    }
}
