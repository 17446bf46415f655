//! Target address framing.
//!
//! Wire format following the handshake: `addr_type_u8 | addr_body |
//! port_be_u16`, using the SOCKS5 address type tags so ingress requests
//! forward without translation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tokio::io::AsyncRead;

use crate::crypto::RecordReader;
use crate::error::{Error, Result};

/// IPv4 address tag (4-byte body).
pub const ADDR_IPV4: u8 = 0x01;
/// Domain name tag (`len_u8 | utf8 bytes`).
pub const ADDR_DOMAIN: u8 = 0x03;
/// IPv6 address tag (16-byte body).
pub const ADDR_IPV6: u8 = 0x04;

const MAX_DOMAIN_LEN: usize = 255;

/// Destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    /// IPv4 literal
    Ipv4(Ipv4Addr),
    /// IPv6 literal
    Ipv6(Ipv6Addr),
    /// Domain name, at most 255 bytes
    Domain(String),
}

/// A destination the tunnel dials on the client's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    /// Destination host
    pub host: Host,
    /// Destination port
    pub port: u16,
}

impl TargetAddr {
    /// Build from a host string: an IP literal or a domain name.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let host = match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Host::Ipv4(ip),
            Ok(IpAddr::V6(ip)) => Host::Ipv6(ip),
            Err(_) => {
                if host.is_empty() {
                    return Err(Error::invalid_address("empty host"));
                }
                if host.len() > MAX_DOMAIN_LEN {
                    return Err(Error::invalid_address(format!(
                        "domain of {} bytes exceeds the limit",
                        host.len()
                    )));
                }
                Host::Domain(host.to_string())
            }
        };
        Ok(Self { host, port })
    }

    /// Known IP of the destination, if it is an IP literal.
    pub fn ip(&self) -> Option<IpAddr> {
        match &self.host {
            Host::Ipv4(ip) => Some(IpAddr::V4(*ip)),
            Host::Ipv6(ip) => Some(IpAddr::V6(*ip)),
            Host::Domain(_) => None,
        }
    }

    /// Serialize to the tunnel wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 16 + 2);
        match &self.host {
            Host::Ipv4(ip) => {
                buf.push(ADDR_IPV4);
                buf.extend_from_slice(&ip.octets());
            }
            Host::Ipv6(ip) => {
                buf.push(ADDR_IPV6);
                buf.extend_from_slice(&ip.octets());
            }
            Host::Domain(name) => {
                buf.push(ADDR_DOMAIN);
                buf.push(name.len() as u8);
                buf.extend_from_slice(name.as_bytes());
            }
        }
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf
    }

    /// Parse from the decrypted tunnel stream.
    pub async fn read_from<R>(reader: &mut RecordReader<R>) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag).await?;

        let host = match tag[0] {
            ADDR_IPV4 => {
                let mut body = [0u8; 4];
                reader.read_exact(&mut body).await?;
                Host::Ipv4(Ipv4Addr::from(body))
            }
            ADDR_DOMAIN => {
                let mut len = [0u8; 1];
                reader.read_exact(&mut len).await?;
                if len[0] == 0 {
                    return Err(Error::invalid_address("empty domain"));
                }
                let mut name = vec![0u8; len[0] as usize];
                reader.read_exact(&mut name).await?;
                let name = String::from_utf8(name)
                    .map_err(|_| Error::invalid_address("domain is not utf-8"))?;
                Host::Domain(name)
            }
            ADDR_IPV6 => {
                let mut body = [0u8; 16];
                reader.read_exact(&mut body).await?;
                Host::Ipv6(Ipv6Addr::from(body))
            }
            other => {
                return Err(Error::invalid_address(format!(
                    "unknown address type 0x{:02x}",
                    other
                )));
            }
        };

        let mut port = [0u8; 2];
        reader.read_exact(&mut port).await?;
        Ok(Self {
            host,
            port: u16::from_be_bytes(port),
        })
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ipv4(ip) => write!(f, "{}:{}", ip, self.port),
            Host::Ipv6(ip) => write!(f, "[{}]:{}", ip, self.port),
            Host::Domain(name) => write!(f, "{}:{}", name, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecReader, CodecWriter, Direction, Table};
    use crate::config::AeadKind;
    use crate::crypto::{RecordCipher, RecordWriter};
    use std::sync::Arc;

    async fn wire_roundtrip(addr: &TargetAddr) -> TargetAddr {
        let table = Arc::new(Table::new("hello").unwrap());
        let (near, far) = tokio::io::duplex(1 << 16);
        let (far_read, _fw) = tokio::io::split(far);
        let (_nr, near_write) = tokio::io::split(near);

        let mut writer = RecordWriter::new(
            CodecWriter::new(near_write, Arc::clone(&table), Direction::Duplex, 0, 8),
            RecordCipher::new(AeadKind::ChaCha20Poly1305, "hello"),
        );
        let mut reader = RecordReader::new(
            CodecReader::new(far_read, table, Direction::Duplex, false),
            RecordCipher::new(AeadKind::ChaCha20Poly1305, "hello"),
        );

        writer.write_all(&addr.encode()).await.unwrap();
        TargetAddr::read_from(&mut reader).await.unwrap()
    }

    #[test]
    fn test_encode_ipv4() {
        let addr = TargetAddr::new("1.2.3.4", 80).unwrap();
        assert_eq!(addr.encode(), vec![0x01, 1, 2, 3, 4, 0x00, 0x50]);
    }

    #[test]
    fn test_encode_domain() {
        let addr = TargetAddr::new("example.com", 443).unwrap();
        let mut expected = vec![0x03, 11];
        expected.extend_from_slice(b"example.com");
        expected.extend_from_slice(&[0x01, 0xbb]);
        assert_eq!(addr.encode(), expected);
    }

    #[test]
    fn test_encode_ipv6() {
        let addr = TargetAddr::new("::1", 53).unwrap();
        let encoded = addr.encode();
        assert_eq!(encoded[0], ADDR_IPV6);
        assert_eq!(encoded.len(), 1 + 16 + 2);
        assert_eq!(&encoded[17..], &[0, 53]);
    }

    #[test]
    fn test_rejects_oversized_domain() {
        let long = "a".repeat(256);
        assert!(TargetAddr::new(&long, 80).is_err());
        assert!(TargetAddr::new("", 80).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TargetAddr::new("1.2.3.4", 80).unwrap().to_string(), "1.2.3.4:80");
        assert_eq!(TargetAddr::new("::1", 80).unwrap().to_string(), "[::1]:80");
        assert_eq!(
            TargetAddr::new("example.com", 8080).unwrap().to_string(),
            "example.com:8080"
        );
    }

    #[tokio::test]
    async fn test_tunnel_roundtrip() {
        for host in ["10.0.0.1", "example.com", "2001:db8::7"] {
            let addr = TargetAddr::new(host, 4433).unwrap();
            assert_eq!(wire_roundtrip(&addr).await, addr);
        }
    }
}
