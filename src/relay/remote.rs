//! Remote relay: tunnel in, TCP out

use super::{ConnectionHandler, Leg, Listener, Role};
use crate::config::RemoteConfig;
use crate::obfuscation::{MixCipher, PaddingConfig};
use crate::protocol::ConnectReply;
use crate::proxy::{Address, AddressError, ProxyError, Reply};
use crate::transport::{self, TransportConfig};
use crate::tunnel::{recv_message, send_message};
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, info_span, Span};

/// Remote half of a connection: reads the destination from the tunnel and
/// dials it
pub struct RemoteRole {
    cipher: Arc<MixCipher>,
    padding: PaddingConfig,
    transport: TransportConfig,
}

impl RemoteRole {
    pub fn new(key: &str, transport: TransportConfig) -> Self {
        Self {
            cipher: Arc::new(MixCipher::new(key)),
            padding: PaddingConfig::default(),
            transport,
        }
    }

    async fn send_connect_reply(&self, client: &mut TcpStream, reply: Reply) -> crate::Result<()> {
        let message = ConnectReply::new(reply).encode(&self.padding);
        send_message(client, &self.cipher, &message).await?;
        Ok(())
    }
}

#[async_trait]
impl Role for RemoteRole {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn parse_incoming_address(&self, client: &mut TcpStream) -> crate::Result<Address> {
        let message = recv_message(client, &self.cipher)
            .await?
            .ok_or(Error::ConnectionClosed)?;

        match Address::decode(&message) {
            Ok((address, _)) => Ok(address),
            Err(AddressError::UnsupportedType(atyp)) => {
                if let Err(e) = self
                    .send_connect_reply(client, Reply::AddressTypeNotSupported)
                    .await
                {
                    debug!("Failed to send address type rejection: {}", e);
                }
                Err(ProxyError::UnsupportedAddressType(atyp).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn establish_peer_connection(&self, target: &Address) -> crate::Result<TcpStream> {
        transport::connect_address(target, self.transport.connect_timeout)
            .await
            .map_err(|e| {
                debug!("Connect to {} failed: {}", target, e);
                Error::from(ProxyError::PeerConnectFailed {
                    target: target.to_string(),
                    reply: Reply::from_io_error(&e),
                })
            })
    }

    async fn send_reply(&self, client: &mut TcpStream, reply: Reply) -> crate::Result<()> {
        self.send_connect_reply(client, reply).await
    }

    fn wrap_incoming_leg(&self) -> Leg {
        Leg::Tunnel(Arc::clone(&self.cipher))
    }

    fn wrap_outgoing_leg(&self) -> Leg {
        Leg::Plain
    }
}

/// Builder for a listening remote relay
pub struct RemoteRelay {
    config: RemoteConfig,
    span: Span,
}

impl RemoteRelay {
    pub fn new(config: RemoteConfig) -> Self {
        let span = info_span!("remote", listen = %format!("{}:{}", config.listen_host, config.listen_port));
        Self { config, span }
    }

    /// Log under `span` instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn role(&self) -> RemoteRole {
        RemoteRole::new(&self.config.key, self.config.limits.transport())
    }

    /// Bind the tunnel listener
    pub async fn bind(self) -> crate::Result<Listener<RemoteRole>> {
        let handler = ConnectionHandler::new(self.role(), self.config.limits.transport());
        Listener::bind(
            &self.config.listen_host,
            self.config.listen_port,
            handler,
            self.config.limits.max_connections,
            self.span,
        )
        .await
    }
}
