//! Relay engine
//!
//! Both relay halves share one connection handler and one stream pump. What
//! differs between them is captured by the [`Role`] trait:
//!
//! | | incoming leg | outgoing leg |
//! |---|---|---|
//! | [`LocalRole`] | plain SOCKS5 from the application | tunnel to the remote relay |
//! | [`RemoteRole`] | tunnel from the local relay | plain TCP to the destination |

mod handler;
mod listener;
mod local;
mod pump;
mod remote;

pub use handler::ConnectionHandler;
pub use listener::Listener;
pub use local::{LocalRelay, LocalRole};
pub use pump::StreamRelay;
pub use remote::{RemoteRelay, RemoteRole};

use crate::obfuscation::MixCipher;
use crate::proxy::{Address, Reply};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;

/// How bytes are carried on one side of a connection
#[derive(Clone)]
pub enum Leg {
    /// Raw bytes, passed through untouched
    Plain,
    /// Framed and obfuscated messages
    Tunnel(Arc<MixCipher>),
}

impl std::fmt::Debug for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Plain => f.write_str("Plain"),
            Leg::Tunnel(_) => f.write_str("Tunnel"),
        }
    }
}

/// What a relay half does differently from the other
#[async_trait]
pub trait Role: Send + Sync + 'static {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Read the destination from a freshly accepted connection. Protocol
    /// failure replies are sent here before the error is returned.
    async fn parse_incoming_address(&self, client: &mut TcpStream) -> crate::Result<Address>;

    /// Open the outgoing leg towards `target`
    async fn establish_peer_connection(&self, target: &Address) -> crate::Result<TcpStream>;

    /// Tell the incoming side how the connect went
    async fn send_reply(&self, client: &mut TcpStream, reply: Reply) -> crate::Result<()>;

    /// Transform applied on the accepted socket
    fn wrap_incoming_leg(&self) -> Leg;

    /// Transform applied on the socket this role opens
    fn wrap_outgoing_leg(&self) -> Leg;
}
