//! SOCKS5 ingress: no-auth negotiation and CONNECT parsing.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::protocol::{Host, TargetAddr, ADDR_DOMAIN, ADDR_IPV4, ADDR_IPV6};

const VERSION: u8 = 0x05;

/// Reply codes this front-end sends.
pub mod reply {
    /// Request granted
    pub const SUCCESS: u8 = 0x00;
    /// Host unreachable: routing or dial failure
    pub const HOST_UNREACHABLE: u8 = 0x04;
    /// Command not supported: anything but CONNECT
    pub const COMMAND_NOT_SUPPORTED: u8 = 0x07;
    /// Address type not supported
    pub const ADDR_NOT_SUPPORTED: u8 = 0x08;
}

/// Run the negotiation and read the CONNECT request.
///
/// On a protocol violation an error reply is sent before the error returns;
/// the caller just drops the stream.
pub async fn read_request(stream: &mut TcpStream) -> Result<TargetAddr> {
    // greeting: VER | NMETHODS | METHODS...
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await?;
    if head[0] != VERSION {
        return Err(Error::invalid_address("not a SOCKS5 greeting"));
    }
    let mut methods = vec![0u8; head[1] as usize];
    stream.read_exact(&mut methods).await?;

    // no authentication required
    stream.write_all(&[VERSION, 0x00]).await?;

    // request: VER | CMD | RSV | ATYP
    let mut request = [0u8; 4];
    stream.read_exact(&mut request).await?;
    if request[1] != 0x01 {
        send_reply(stream, reply::COMMAND_NOT_SUPPORTED).await?;
        return Err(Error::invalid_address("only CONNECT is supported"));
    }

    let host = match request[3] {
        ADDR_IPV4 => {
            let mut body = [0u8; 4];
            stream.read_exact(&mut body).await?;
            Host::Ipv4(body.into())
        }
        ADDR_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            let mut name = vec![0u8; len[0] as usize];
            stream.read_exact(&mut name).await?;
            let name = String::from_utf8(name)
                .map_err(|_| Error::invalid_address("domain is not utf-8"))?;
            Host::Domain(name)
        }
        ADDR_IPV6 => {
            let mut body = [0u8; 16];
            stream.read_exact(&mut body).await?;
            Host::Ipv6(body.into())
        }
        _ => {
            send_reply(stream, reply::ADDR_NOT_SUPPORTED).await?;
            return Err(Error::invalid_address("unsupported SOCKS5 address type"));
        }
    };

    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;
    Ok(TargetAddr {
        host,
        port: u16::from_be_bytes(port),
    })
}

/// Send a reply carrying a zeroed IPv4 bind address.
pub async fn send_reply(stream: &mut TcpStream, code: u8) -> Result<()> {
    stream
        .write_all(&[VERSION, code, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Host;
    use tokio::net::TcpListener;

    async fn request_of(client_bytes: Vec<u8>) -> Result<TargetAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&client_bytes).await.unwrap();
            // keep the socket open while the server parses
            let mut sink = [0u8; 64];
            let _ = stream.read(&mut sink).await;
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let result = read_request(&mut stream).await;
        peer.abort();
        result
    }

    #[tokio::test]
    async fn test_connect_to_ipv4() {
        let mut bytes = vec![0x05, 0x01, 0x00]; // greeting, one method
        bytes.extend_from_slice(&[0x05, 0x01, 0x00, 0x01, 93, 184, 216, 34, 0x00, 0x50]);
        let target = request_of(bytes).await.unwrap();
        assert_eq!(target.host, Host::Ipv4("93.184.216.34".parse().unwrap()));
        assert_eq!(target.port, 80);
    }

    #[tokio::test]
    async fn test_connect_to_domain() {
        let mut bytes = vec![0x05, 0x01, 0x00];
        bytes.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, 11]);
        bytes.extend_from_slice(b"example.com");
        bytes.extend_from_slice(&[0x01, 0xbb]);
        let target = request_of(bytes).await.unwrap();
        assert_eq!(target.host, Host::Domain("example.com".into()));
        assert_eq!(target.port, 443);
    }

    #[tokio::test]
    async fn test_rejects_non_socks5() {
        let result = request_of(vec![0x04, 0x01]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rejects_udp_associate() {
        let mut bytes = vec![0x05, 0x01, 0x00];
        bytes.extend_from_slice(&[0x05, 0x03, 0x00, 0x01, 1, 2, 3, 4, 0, 53]);
        let result = request_of(bytes).await;
        assert!(result.is_err());
    }
}
