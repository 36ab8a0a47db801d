//! Local relay: SOCKS5 in, tunnel out

use super::{ConnectionHandler, Leg, Listener, Role};
use crate::config::LocalConfig;
use crate::obfuscation::MixCipher;
use crate::protocol::ConnectReply;
use crate::proxy::{make_reply, send_failure, Address, ProxyError, Reply, Socks5Handshake};
use crate::transport::{self, with_timeout, TransportConfig};
use crate::tunnel::{recv_message, send_message};
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info_span, Span};

/// Local half of a connection: answers SOCKS5 and dials the remote relay
pub struct LocalRole {
    server_host: String,
    server_port: u16,
    cipher: Arc<MixCipher>,
    transport: TransportConfig,
}

impl LocalRole {
    pub fn new(server_host: impl Into<String>, server_port: u16, key: &str, transport: TransportConfig) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            cipher: Arc::new(MixCipher::new(key)),
            transport,
        }
    }
}

#[async_trait]
impl Role for LocalRole {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn parse_incoming_address(&self, client: &mut TcpStream) -> crate::Result<Address> {
        Ok(Socks5Handshake::new(client).run().await?)
    }

    async fn establish_peer_connection(&self, target: &Address) -> crate::Result<TcpStream> {
        let mut tunnel = transport::connect(
            (self.server_host.as_str(), self.server_port),
            self.transport.connect_timeout,
        )
        .await?;
        debug!("Tunnel open to {}:{}", self.server_host, self.server_port);

        send_message(&mut tunnel, &self.cipher, &target.to_bytes()?).await?;

        let reply = with_timeout(self.transport.idle_timeout, recv_message(&mut tunnel, &self.cipher))
            .await?
            .ok_or(Error::ConnectionClosed)?;
        let reply = ConnectReply::decode(&reply)?;

        if !reply.is_success() {
            return Err(ProxyError::PeerConnectFailed {
                target: target.to_string(),
                reply: reply.status,
            }
            .into());
        }

        Ok(tunnel)
    }

    async fn send_reply(&self, client: &mut TcpStream, reply: Reply) -> crate::Result<()> {
        if reply.is_success() {
            let bound = client.local_addr()?;
            client.write_all(&make_reply(reply, bound)).await?;
        } else {
            send_failure(client, reply).await;
        }
        Ok(())
    }

    fn wrap_incoming_leg(&self) -> Leg {
        Leg::Plain
    }

    fn wrap_outgoing_leg(&self) -> Leg {
        Leg::Tunnel(Arc::clone(&self.cipher))
    }
}

/// Builder for a listening local relay
pub struct LocalRelay {
    config: LocalConfig,
    span: Span,
}

impl LocalRelay {
    pub fn new(config: LocalConfig) -> Self {
        let span = info_span!("local", listen = %format!("{}:{}", config.listen_host, config.listen_port));
        Self { config, span }
    }

    /// Log under `span` instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn role(&self) -> LocalRole {
        LocalRole::new(
            self.config.server_host.clone(),
            self.config.server_port,
            &self.config.key,
            self.config.limits.transport(),
        )
    }

    /// Bind the SOCKS5 listener
    pub async fn bind(self) -> crate::Result<Listener<LocalRole>> {
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
