//! HTTP proxy ingress.
//!
//! Supports CONNECT tunnels and plain proxied requests. CONNECT gets a
//! `200 Connection Established` and the remainder of the stream is spliced
//! verbatim; other methods have their request line rewritten to origin form
//! and the whole head forwarded to the target.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::protocol::TargetAddr;

const MAX_HEAD: usize = 8 * 1024;

/// A parsed proxy request.
pub struct HttpRequest {
    /// Destination derived from the request
    pub target: TargetAddr,
    /// Whether this is a CONNECT tunnel
    pub connect: bool,
    /// Bytes to forward to the target before splicing: the rewritten head
    /// for plain requests, any early-sent payload for CONNECT
    pub preface: Vec<u8>,
}

/// Read the request head and derive the destination.
pub async fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    let raw = read_head(stream).await?;
    let term = find_terminator(&raw).expect("read_head returns a complete head");
    let (head, residue) = raw.split_at(term + 4);

    let text = std::str::from_utf8(head)
        .map_err(|_| Error::invalid_address("request head is not utf-8"))?;
    let request_line = text.split("\r\n").next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Error::invalid_address("empty request line"))?;
    let uri = parts
        .next()
        .ok_or_else(|| Error::invalid_address("missing request target"))?;
    let version = parts.next().unwrap_or("HTTP/1.1");

    if method.eq_ignore_ascii_case("CONNECT") {
        let (host, port) = split_host_port(uri, 443)?;
        return Ok(HttpRequest {
            target: TargetAddr::new(&host, port)?,
            connect: true,
            preface: residue.to_vec(),
        });
    }

    let (host, port, origin_uri) = if let Some(rest) = uri.strip_prefix("http://") {
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (host, port) = split_host_port(authority, 80)?;
        (host, port, path.to_string())
    } else {
        // origin-form request: the destination comes from the Host header
        let host_header = text
            .split("\r\n")
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.trim().to_string())
            .ok_or_else(|| Error::invalid_address("missing Host header"))?;
        let (host, port) = split_host_port(&host_header, 80)?;
        (host, port, uri.to_string())
    };

    let mut preface = format!("{} {} {}\r\n", method, origin_uri, version).into_bytes();
    let first_line_end = find_crlf(head).expect("head contains a request line");
    preface.extend_from_slice(&head[first_line_end + 2..]);
    preface.extend_from_slice(residue);

    Ok(HttpRequest {
        target: TargetAddr::new(&host, port)?,
        connect: false,
        preface,
    })
}

/// Acknowledge an established CONNECT tunnel.
pub async fn reply_established(stream: &mut TcpStream) -> Result<()> {
    stream
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await?;
    Ok(())
}

/// Report an unreachable target.
pub async fn reply_bad_gateway(stream: &mut TcpStream) -> Result<()> {
    stream
        .write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n")
        .await?;
    Ok(())
}

async fn read_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::invalid_address("connection closed before request head"));
        }
        buf.extend_from_slice(&chunk[..n]);
        if find_terminator(&buf).is_some() {
            return Ok(buf);
        }
        if buf.len() > MAX_HEAD {
            return Err(Error::invalid_address("request head too large"));
        }
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn split_host_port(authority: &str, default_port: u16) -> Result<(String, u16)> {
    if let Some(rest) = authority.strip_prefix('[') {
        // bracketed IPv6 literal, optionally with a port
        let end = rest
            .find(']')
            .ok_or_else(|| Error::invalid_address("unterminated IPv6 literal"))?;
        let host = rest[..end].to_string();
        let port = match rest[end + 1..].strip_prefix(':') {
            Some(p) => p
                .parse()
                .map_err(|_| Error::invalid_address("invalid port"))?,
            None => default_port,
        };
        return Ok((host, port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok((
            host.to_string(),
            port.parse()
                .map_err(|_| Error::invalid_address("invalid port"))?,
        )),
        _ => Ok((authority.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Host;
    use tokio::net::TcpListener;

    async fn request_of(client_bytes: &'static [u8]) -> Result<HttpRequest> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(client_bytes).await.unwrap();
            let mut sink = [0u8; 64];
            let _ = stream.read(&mut sink).await;
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let result = read_request(&mut stream).await;
        peer.abort();
        result
    }

    #[tokio::test]
    async fn test_connect_request() {
        let request = request_of(b"CONNECT example.com:8443 HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .await
            .unwrap();
        assert!(request.connect);
        assert_eq!(request.target.host, Host::Domain("example.com".into()));
        assert_eq!(request.target.port, 8443);
        assert!(request.preface.is_empty());
    }

    #[tokio::test]
    async fn test_connect_defaults_to_443() {
        let request = request_of(b"CONNECT example.com HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(request.target.port, 443);
    }

    #[tokio::test]
    async fn test_absolute_form_is_rewritten() {
        let request = request_of(
            b"GET http://example.com/index.html HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n",
        )
        .await
        .unwrap();
        assert!(!request.connect);
        assert_eq!(request.target.port, 80);
        let head = String::from_utf8(request.preface).unwrap();
        assert!(head.starts_with("GET /index.html HTTP/1.1\r\n"));
        assert!(head.contains("Accept: */*\r\n"));
    }

    #[tokio::test]
    async fn test_origin_form_uses_host_header() {
        let request = request_of(b"GET /path HTTP/1.1\r\nHost: example.com:8080\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.target.host, Host::Domain("example.com".into()));
        assert_eq!(request.target.port, 8080);
    }

    #[tokio::test]
    async fn test_body_bytes_survive_the_rewrite() {
        let request = request_of(
            b"POST http://example.com/submit HTTP/1.1\r\nHost: example.com\r\nContent-Length: 4\r\n\r\nwxyz",
        )
        .await
        .unwrap();
        let head = request.preface;
        assert!(head.ends_with(b"\r\n\r\nwxyz"));
    }

    #[tokio::test]
    async fn test_missing_host_header_is_rejected() {
        let result = request_of(b"GET /path HTTP/1.1\r\nAccept: */*\r\n\r\n").await;
        assert!(result.is_err());
    }
}
