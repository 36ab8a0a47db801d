//! Per-connection lifecycle: handshake, connect, relay, teardown

use super::{Role, StreamRelay};
use crate::proxy::{HandshakeState, Reply};
use crate::transport::{with_timeout, TransportConfig};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Drives one accepted socket through its whole life.
///
/// Every socket opened for the connection is owned by [`handle`] and dropped
/// before it returns, on success and on every error path.
///
/// [`handle`]: ConnectionHandler::handle
pub struct ConnectionHandler<R> {
    role: Arc<R>,
    transport: TransportConfig,
}

impl<R> Clone for ConnectionHandler<R> {
    fn clone(&self) -> Self {
        Self {
            role: Arc::clone(&self.role),
            transport: self.transport,
        }
    }
}

impl<R: Role> ConnectionHandler<R> {
    pub fn new(role: R, transport: TransportConfig) -> Self {
        Self {
            role: Arc::new(role),
            transport,
        }
    }

    pub fn role(&self) -> &R {
        &self.role
    }

    /// Handle a connection until it closes. Failures are logged here and
    /// also returned.
    pub async fn handle(&self, client: TcpStream) -> crate::Result<()> {
        let mut state = HandshakeState::AwaitVersion;
        let result = self.drive(client, &mut state).await;

        match &result {
            Ok(()) => advance(&mut state, HandshakeState::Closed),
            Err(e) => {
                warn!("{} connection failed during {}: {}", self.role.name(), phase(state), e);
                advance(&mut state, HandshakeState::Failed);
            }
        }

        result
    }

    async fn drive(&self, mut client: TcpStream, state: &mut HandshakeState) -> crate::Result<()> {
        let from = client.peer_addr()?;

        let target = with_timeout(
            self.transport.idle_timeout,
            self.role.parse_incoming_address(&mut client),
        )
        .await?;
        advance(state, HandshakeState::Connecting);

        info!("Connecting {} from {}", target, from);
        let peer = match self.role.establish_peer_connection(&target).await {
            Ok(peer) => peer,
            Err(e) => {
                let reply = e.reply();
                if let Err(send_err) = self.role.send_reply(&mut client, reply).await {
                    debug!("Failed to send {:?} reply: {}", reply, send_err);
                }
                return Err(e);
            }
        };

        self.role.send_reply(&mut client, Reply::Succeeded).await?;
        advance(state, HandshakeState::Relaying);

        let (sent, received) = StreamRelay::new(self.transport.idle_timeout)
            .run(
                client,
                self.role.wrap_incoming_leg(),
                peer,
                self.role.wrap_outgoing_leg(),
            )
            .await?;

        debug!("Closed {} ({} bytes up, {} bytes down)", target, sent, received);
        Ok(())
    }
}

fn advance(state: &mut HandshakeState, next: HandshakeState) {
    trace!("Connection {:?} -> {:?}", state, next);
    *state = next;
}

/// Coarse phase for log lines. Before the destination is known the handler
/// only sees the role's handshake as a whole.
fn phase(state: HandshakeState) -> &'static str {
    match state {
        HandshakeState::AwaitVersion | HandshakeState::AwaitAuthMethods | HandshakeState::AwaitRequest => {
            "handshake"
        }
        HandshakeState::Connecting => "connect",
        HandshakeState::Relaying => "relay",
        HandshakeState::Closed | HandshakeState::Failed => "teardown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(phase(HandshakeState::AwaitVersion), "handshake");
        assert_eq!(phase(HandshakeState::AwaitRequest), "handshake");
        assert_eq!(phase(HandshakeState::Connecting), "connect");
        assert_eq!(phase(HandshakeState::Relaying), "relay");
    }
}
