//! Outbound TCP dials

use crate::proxy::Address;
use std::io;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Connect to `addr`, giving up with `TimedOut` after `timeout`
pub async fn connect<A: ToSocketAddrs>(addr: A, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let stream = match timeout {
        Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??,
        None => TcpStream::connect(addr).await?,
    };

    // Small writes (replies, frame headers) must not wait on Nagle
    stream.set_nodelay(true).ok();

    Ok(stream)
}

/// Connect to a proxy target, resolving domain names
pub async fn connect_address(target: &Address, timeout: Option<Duration>) -> io::Result<TcpStream> {
    match target {
        Address::Ipv4(ip, port) => connect((*ip, *port), timeout).await,
        Address::Ipv6(ip, port) => connect((*ip, *port), timeout).await,
        Address::Domain(domain, port) => connect((domain.as_str(), *port), timeout).await,
    }
}
