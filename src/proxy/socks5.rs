//! SOCKS5 CONNECT handshake (RFC 1928 subset)

use super::{Address, ProxyError};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// SOCKS5 version
pub const SOCKS_VERSION: u8 = 0x05;

/// Authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthMethod {
    NoAuth = 0x00,
    Gssapi = 0x01,
    UsernamePassword = 0x02,
    NoAcceptable = 0xFF,
}

/// SOCKS5 commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

impl TryFrom<u8> for Command {
    type Error = ProxyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Connect),
            0x02 => Ok(Command::Bind),
            0x03 => Ok(Command::UdpAssociate),
            _ => Err(ProxyError::UnsupportedCommand(value)),
        }
    }
}

/// Reply codes
///
/// Also used as the status byte of the tunnel connect reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl Reply {
    /// Map a status byte back to a reply; unknown codes become
    /// `GeneralFailure`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Reply::Succeeded,
            0x02 => Reply::ConnectionNotAllowed,
            0x03 => Reply::NetworkUnreachable,
            0x04 => Reply::HostUnreachable,
            0x05 => Reply::ConnectionRefused,
            0x06 => Reply::TtlExpired,
            0x07 => Reply::CommandNotSupported,
            0x08 => Reply::AddressTypeNotSupported,
            _ => Reply::GeneralFailure,
        }
    }

    /// Reply code for a failed outbound connect
    pub fn from_io_error(e: &std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::ConnectionRefused => Reply::ConnectionRefused,
            std::io::ErrorKind::PermissionDenied => Reply::ConnectionNotAllowed,
            _ => Reply::HostUnreachable,
        }
    }

    pub fn is_success(self) -> bool {
        self == Reply::Succeeded
    }
}

/// Lifecycle of one proxied connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the SOCKS version byte
    AwaitVersion,
    /// Waiting for the offered auth methods
    AwaitAuthMethods,
    /// Waiting for the CONNECT request (or the tunnel's address message)
    AwaitRequest,
    /// Destination known, outbound connect in progress
    Connecting,
    /// Both sockets established, bytes flowing
    Relaying,
    /// Relay finished normally
    Closed,
    /// Any stage failed
    Failed,
}

/// Server side of a SOCKS5 handshake over a borrowed stream
pub struct Socks5Handshake<'a, S> {
    stream: &'a mut S,
    state: HandshakeState,
    failed_in: Option<HandshakeState>,
}

impl<'a, S> Socks5Handshake<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: &'a mut S) -> Self {
        Self {
            stream,
            state: HandshakeState::AwaitVersion,
            failed_in: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Stage the handshake was in when it failed
    pub fn failed_in(&self) -> Option<HandshakeState> {
        self.failed_in
    }

    fn advance(&mut self, next: HandshakeState) {
        trace!("SOCKS5 handshake {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run method negotiation and read the CONNECT request.
    ///
    /// Ends in `Connecting` with the destination on success, or in `Failed`.
    /// Failure replies the protocol requires have already been sent.
    pub async fn run(&mut self) -> Result<Address, ProxyError> {
        let result = match self.negotiate().await {
            Ok(()) => self.read_request().await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => self.advance(HandshakeState::Connecting),
            Err(e) => {
                debug!("SOCKS5 handshake failed while {:?}: {}", self.state, e);
                self.failed_in = Some(self.state);
                self.advance(HandshakeState::Failed);
            }
        }

        result
    }

    /// Version check and auth method selection. Only no-auth is honoured.
    pub async fn negotiate(&mut self) -> Result<(), ProxyError> {
        let version = self.stream.read_u8().await?;
        if version != SOCKS_VERSION {
            return Err(ProxyError::InvalidSocksVersion(version));
        }
        self.advance(HandshakeState::AwaitAuthMethods);

        let nmethods = self.stream.read_u8().await? as usize;
        let mut methods = [0u8; 255];
        self.stream.read_exact(&mut methods[..nmethods]).await?;

        if !methods[..nmethods].contains(&(AuthMethod::NoAuth as u8)) {
            let reject = [SOCKS_VERSION, AuthMethod::NoAcceptable as u8];
            if let Err(e) = self.stream.write_all(&reject).await {
                debug!("Failed to send auth rejection: {}", e);
            }
            return Err(ProxyError::AuthenticationFailed);
        }

        self.stream
            .write_all(&[SOCKS_VERSION, AuthMethod::NoAuth as u8])
            .await?;
        self.advance(HandshakeState::AwaitRequest);

        Ok(())
    }

    /// Read a CONNECT request and return its destination
    pub async fn read_request(&mut self) -> Result<Address, ProxyError> {
        let mut head = [0u8; 4];
        self.stream.read_exact(&mut head).await?;

        if head[0] != SOCKS_VERSION {
            return Err(ProxyError::InvalidSocksVersion(head[0]));
        }

        // head[2] is reserved
        match Command::try_from(head[1]) {
            Ok(Command::Connect) => {}
            Ok(_) | Err(_) => {
                send_failure(&mut *self.stream, Reply::CommandNotSupported).await;
                return Err(ProxyError::UnsupportedCommand(head[1]));
            }
        }

        let address = match Address::read_from(&mut *self.stream, head[3]).await {
            Ok(address) => address,
            Err(ProxyError::UnsupportedAddressType(atyp)) => {
                send_failure(&mut *self.stream, Reply::AddressTypeNotSupported).await;
                return Err(ProxyError::UnsupportedAddressType(atyp));
            }
            Err(e) => return Err(e),
        };

        debug!("SOCKS5 CONNECT to {}", address);
        Ok(address)
    }
}

/// Build a reply: `VER REP RSV ATYP BND.ADDR BND.PORT`
pub fn make_reply(reply: Reply, bound: SocketAddr) -> Vec<u8> {
    let mut buf = vec![SOCKS_VERSION, reply as u8, 0x00];

    match bound {
        SocketAddr::V4(v4) => {
            buf.push(0x01);
            buf.extend_from_slice(&v4.ip().octets());
            buf.extend_from_slice(&v4.port().to_be_bytes());
        }
        SocketAddr::V6(v6) => {
            buf.push(0x04);
            buf.extend_from_slice(&v6.ip().octets());
            buf.extend_from_slice(&v6.port().to_be_bytes());
        }
    }

    buf
}

/// Best-effort failure reply with an unspecified bound address. Write errors
/// are logged and dropped; the caller closes the socket either way.
pub async fn send_failure<W>(stream: &mut W, reply: Reply)
where
    W: AsyncWrite + Unpin,
{
    let buf = make_reply(reply, SocketAddr::from(([0, 0, 0, 0], 0)));
    if let Err(e) = stream.write_all(&buf).await {
        debug!("Failed to send SOCKS5 {:?} reply: {}", reply, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::duplex;

    async fn run_server(input: &[u8]) -> (Result<Address, ProxyError>, HandshakeState, Vec<u8>) {
        let (result, state, _, output) = run_server_traced(input).await;
        (result, state, output)
    }

    async fn run_server_traced(
        input: &[u8],
    ) -> (Result<Address, ProxyError>, HandshakeState, Option<HandshakeState>, Vec<u8>) {
        let (mut client, mut server) = duplex(1024);
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let (result, state, failed_in) = {
            let mut handshake = Socks5Handshake::new(&mut server);
            let result = handshake.run().await;
            (result, handshake.state(), handshake.failed_in())
        };
        drop(server);

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        (result, state, failed_in, output)
    }

    #[tokio::test]
    async fn test_connect_ipv4() {
        let (result, state, output) =
            run_server(&[0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]).await;

        assert_eq!(result.unwrap(), Address::Ipv4(Ipv4Addr::new(127, 0, 0, 1), 80));
        assert_eq!(state, HandshakeState::Connecting);
        assert_eq!(output, vec![0x05, 0x00]);
    }

    #[tokio::test]
    async fn test_connect_domain() {
        let mut input = vec![0x05, 0x02, 0x02, 0x00, 0x05, 0x01, 0x00, 0x03, 11];
        input.extend_from_slice(b"example.com");
        input.extend_from_slice(&443u16.to_be_bytes());

        let (result, _, output) = run_server(&input).await;
        assert_eq!(result.unwrap(), Address::Domain("example.com".to_string(), 443));
        assert_eq!(output, vec![0x05, 0x00]);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let (result, state, output) = run_server(&[0x04, 0x01, 0x00]).await;

        assert!(matches!(result, Err(ProxyError::InvalidSocksVersion(0x04))));
        assert_eq!(state, HandshakeState::Failed);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_auth_rejected() {
        let (result, state, output) = run_server(&[0x05, 0x01, 0x02]).await;

        assert!(matches!(result, Err(ProxyError::AuthenticationFailed)));
        assert_eq!(state, HandshakeState::Failed);
        assert_eq!(output, vec![0x05, 0xFF]);
    }

    #[tokio::test]
    async fn test_bind_not_supported() {
        let (result, state, output) =
            run_server(&[0x05, 0x01, 0x00, 0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]).await;

        assert!(matches!(result, Err(ProxyError::UnsupportedCommand(0x02))));
        assert_eq!(state, HandshakeState::Failed);
        assert_eq!(&output[..2], &[0x05, 0x00]);
        assert_eq!(&output[2..], &[0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_address_type_not_supported() {
        let (result, _, output) =
            run_server(&[0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x02, 1, 2, 3, 4, 0x00, 0x50]).await;

        assert!(matches!(result, Err(ProxyError::UnsupportedAddressType(0x02))));
        assert_eq!(&output[2..], &[0x05, 0x08, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_failure_stage_recorded() {
        let (_, _, failed_in, _) = run_server_traced(&[0x04, 0x01, 0x00]).await;
        assert_eq!(failed_in, Some(HandshakeState::AwaitVersion));

        let (_, _, failed_in, _) = run_server_traced(&[0x05, 0x01, 0x02]).await;
        assert_eq!(failed_in, Some(HandshakeState::AwaitAuthMethods));

        let (_, _, failed_in, _) =
            run_server_traced(&[0x05, 0x01, 0x00, 0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]).await;
        assert_eq!(failed_in, Some(HandshakeState::AwaitRequest));

        let (_, state, failed_in, _) =
            run_server_traced(&[0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50]).await;
        assert_eq!(state, HandshakeState::Connecting);
        assert_eq!(failed_in, None);
    }

    #[tokio::test]
    async fn test_truncated_request() {
        let (result, state, _) = run_server(&[0x05, 0x01, 0x00, 0x05, 0x01]).await;

        assert!(matches!(result, Err(ProxyError::Io(_))));
        assert_eq!(state, HandshakeState::Failed);
    }

    #[test]
    fn test_make_reply() {
        let reply = make_reply(Reply::Succeeded, "10.1.2.3:8080".parse().unwrap());
        assert_eq!(reply, vec![0x05, 0x00, 0x00, 0x01, 10, 1, 2, 3, 0x1f, 0x90]);

        let reply = make_reply(Reply::HostUnreachable, "[::1]:1".parse().unwrap());
        assert_eq!(reply.len(), 4 + 16 + 2);
        assert_eq!(reply[3], 0x04);
    }

    #[test]
    fn test_reply_codes() {
        assert_eq!(Reply::from_u8(0x05), Reply::ConnectionRefused);
        assert_eq!(Reply::from_u8(0x42), Reply::GeneralFailure);
        assert!(Reply::from_u8(0x00).is_success());
    }
}
