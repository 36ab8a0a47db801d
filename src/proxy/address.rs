//! SOCKS5 address records
//!
//! Wire format, shared by the SOCKS5 request and the first tunnel message:
//!
//! ```text
//! +------+----------------------+----------+
//! | ATYP | ADDR                 | PORT     |
//! +------+----------------------+----------+
//! | 0x01 | 4 bytes              | u16 (BE) |
//! | 0x03 | 1 byte len + name    | u16 (BE) |
//! | 0x04 | 16 bytes             | u16 (BE) |
//! +------+----------------------+----------+
//! ```

use super::ProxyError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum length of a domain name record
pub const MAX_DOMAIN_LEN: usize = 255;

/// Address record errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address type not supported: {0:#04x}")]
    UnsupportedType(u8),

    #[error("Address record truncated")]
    Truncated,

    #[error("Invalid domain name")]
    InvalidDomain,

    #[error("Domain name too long: {0} bytes")]
    DomainTooLong(usize),
}

/// Address types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressType {
    Ipv4 = 0x01,
    Domain = 0x03,
    Ipv6 = 0x04,
}

impl TryFrom<u8> for AddressType {
    type Error = AddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(AddressType::Ipv4),
            0x03 => Ok(AddressType::Domain),
            0x04 => Ok(AddressType::Ipv6),
            _ => Err(AddressError::UnsupportedType(value)),
        }
    }
}

/// Proxy target address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IPv4 address and port
    Ipv4(Ipv4Addr, u16),
    /// IPv6 address and port
    Ipv6(Ipv6Addr, u16),
    /// Domain name and port
    Domain(String, u16),
}

impl Address {
    /// Number of bytes [`encode`](Self::encode) writes
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Address::Ipv4(..) => 4,
            Address::Ipv6(..) => 16,
            Address::Domain(domain, _) => 1 + domain.len(),
        } + 2
    }

    /// Append the wire record to `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), AddressError> {
        match self {
            Address::Ipv4(ip, port) => {
                buf.put_u8(AddressType::Ipv4 as u8);
                buf.put_slice(&ip.octets());
                buf.put_u16(*port);
            }
            Address::Ipv6(ip, port) => {
                buf.put_u8(AddressType::Ipv6 as u8);
                buf.put_slice(&ip.octets());
                buf.put_u16(*port);
            }
            Address::Domain(domain, port) => {
                if domain.is_empty() {
                    return Err(AddressError::InvalidDomain);
                }
                if domain.len() > MAX_DOMAIN_LEN {
                    return Err(AddressError::DomainTooLong(domain.len()));
                }
                buf.put_u8(AddressType::Domain as u8);
                buf.put_u8(domain.len() as u8);
                buf.put_slice(domain.as_bytes());
                buf.put_u16(*port);
            }
        }
        Ok(())
    }

    /// Encode into a standalone buffer
    pub fn to_bytes(&self) -> Result<Bytes, AddressError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a record from the front of `buf`.
    ///
    /// Returns the address and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), AddressError> {
        let (&atyp, rest) = buf.split_first().ok_or(AddressError::Truncated)?;

        let (address, used) = match AddressType::try_from(atyp)? {
            AddressType::Ipv4 => {
                let raw: [u8; 4] = take(rest, 0)?;
                let port = u16::from_be_bytes(take(rest, 4)?);
                (Address::Ipv4(Ipv4Addr::from(raw), port), 6)
            }
            AddressType::Ipv6 => {
                let raw: [u8; 16] = take(rest, 0)?;
                let port = u16::from_be_bytes(take(rest, 16)?);
                (Address::Ipv6(Ipv6Addr::from(raw), port), 18)
            }
            AddressType::Domain => {
                let len = *rest.first().ok_or(AddressError::Truncated)? as usize;
                let name = rest.get(1..1 + len).ok_or(AddressError::Truncated)?;
                let domain = parse_domain(name)?;
                let port = u16::from_be_bytes(take(rest, 1 + len)?);
                (Address::Domain(domain, port), 1 + len + 2)
            }
        };

        Ok((address, 1 + used))
    }

    /// Read the address and port that follow an ATYP byte already consumed
    /// from a SOCKS5 request
    pub async fn read_from<R>(reader: &mut R, atyp: u8) -> Result<Self, ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        let address_type =
            AddressType::try_from(atyp).map_err(|_| ProxyError::UnsupportedAddressType(atyp))?;

        let address = match address_type {
            AddressType::Ipv4 => {
                let mut ip = [0u8; 4];
                reader.read_exact(&mut ip).await?;
                let port = reader.read_u16().await?;
                Address::Ipv4(Ipv4Addr::from(ip), port)
            }
            AddressType::Domain => {
                let len = reader.read_u8().await? as usize;
                let mut name = vec![0u8; len];
                reader.read_exact(&mut name).await?;
                let domain = parse_domain(&name)?;
                let port = reader.read_u16().await?;
                Address::Domain(domain, port)
            }
            AddressType::Ipv6 => {
                let mut ip = [0u8; 16];
                reader.read_exact(&mut ip).await?;
                let port = reader.read_u16().await?;
                Address::Ipv6(Ipv6Addr::from(ip), port)
            }
        };

        Ok(address)
    }
}

fn take<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], AddressError> {
    buf.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(AddressError::Truncated)
}

fn parse_domain(name: &[u8]) -> Result<String, AddressError> {
    if name.is_empty() {
        return Err(AddressError::InvalidDomain);
    }
    String::from_utf8(name.to_vec()).map_err(|_| AddressError::InvalidDomain)
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Address::Ipv4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Address::Ipv6(*v6.ip(), v6.port()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip, port) => write!(f, "{}:{}", ip, port),
            Address::Ipv6(ip, port) => write!(f, "[{}]:{}", ip, port),
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(address: Address) {
        let encoded = address.to_bytes().unwrap();
        assert_eq!(encoded.len(), address.encoded_len());

        let (decoded, used) = Address::decode(&encoded).unwrap();
        assert_eq!(decoded, address);
        assert_eq!(used, encoded.len());
    }

    #[test]
    fn test_ipv4_roundtrip() {
        for port in [0, 80, 443, 65535] {
            roundtrip(Address::Ipv4(Ipv4Addr::new(127, 0, 0, 1), port));
        }
    }

    #[test]
    fn test_ipv6_roundtrip() {
        for port in [0, 8080, 65535] {
            roundtrip(Address::Ipv6("2001:db8::1".parse().unwrap(), port));
        }
    }

    #[test]
    fn test_domain_roundtrip() {
        roundtrip(Address::Domain("example.com".to_string(), 443));
        roundtrip(Address::Domain("a".to_string(), 0));
        roundtrip(Address::Domain("x".repeat(MAX_DOMAIN_LEN), 65535));
    }

    #[test]
    fn test_ipv4_wire_bytes() {
        let address = Address::Ipv4(Ipv4Addr::new(127, 0, 0, 1), 80);
        assert_eq!(&address.to_bytes().unwrap()[..], &[0x01, 127, 0, 0, 1, 0x00, 0x50]);
    }

    #[test]
    fn test_domain_wire_bytes() {
        let address = Address::Domain("ab.c".to_string(), 0x1234);
        assert_eq!(
            &address.to_bytes().unwrap()[..],
            &[0x03, 4, b'a', b'b', b'.', b'c', 0x12, 0x34]
        );
    }

    #[test]
    fn test_domain_too_long() {
        let address = Address::Domain("x".repeat(256), 80);
        assert_eq!(address.to_bytes(), Err(AddressError::DomainTooLong(256)));
    }

    #[test]
    fn test_unsupported_type() {
        assert_eq!(
            Address::decode(&[0x02, 1, 2, 3, 4, 0, 80]),
            Err(AddressError::UnsupportedType(0x02))
        );
    }

    #[test]
    fn test_truncated() {
        assert_eq!(Address::decode(&[]), Err(AddressError::Truncated));
        assert_eq!(Address::decode(&[0x01, 127, 0, 0]), Err(AddressError::Truncated));
        assert_eq!(Address::decode(&[0x03, 10, b'a', b'b']), Err(AddressError::Truncated));
        assert_eq!(Address::decode(&[0x04; 10]), Err(AddressError::Truncated));
    }

    #[test]
    fn test_invalid_domain() {
        assert_eq!(Address::decode(&[0x03, 0, 0, 80]), Err(AddressError::InvalidDomain));
        assert_eq!(
            Address::decode(&[0x03, 2, 0xff, 0xfe, 0, 80]),
            Err(AddressError::InvalidDomain)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::Ipv4(Ipv4Addr::new(10, 0, 0, 1), 22).to_string(), "10.0.0.1:22");
        assert_eq!(Address::Ipv6(Ipv6Addr::LOCALHOST, 443).to_string(), "[::1]:443");
        assert_eq!(Address::Domain("example.com".into(), 80).to_string(), "example.com:80");
    }

    #[tokio::test]
    async fn test_read_from_stream() {
        let mut input: &[u8] = &[7, b'a', b'.', b'b', b'.', b'c', b'd', b'e', 0x01, 0xbb];
        let address = Address::read_from(&mut input, 0x03).await.unwrap();
        assert_eq!(address, Address::Domain("a.b.cde".to_string(), 443));
    }

    #[tokio::test]
    async fn test_read_from_rejects_unknown_type() {
        let mut input: &[u8] = &[1, 2, 3, 4, 0, 80];
        let result = Address::read_from(&mut input, 0x02).await;
        assert!(matches!(result, Err(ProxyError::UnsupportedAddressType(0x02))));
    }
}
