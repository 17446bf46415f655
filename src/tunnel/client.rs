//! Client endpoint.
//!
//! Accepts mixed SOCKS5/HTTP ingress on one local port, makes the routing
//! decision, and either dials the destination directly or opens a tunnel:
//! raw TCP to the server, wrapped in the codec and the record layer, then
//! handshake, target address, and a bidirectional relay.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::codec::{CodecReader, CodecWriter, Direction, Table};
use crate::config::{Config, ProxyMode};
use crate::crypto::{RecordCipher, RecordReader, RecordWriter};
use crate::error::{Error, Result};
use crate::ingress::{http, socks5};
use crate::protocol::{Handshake, TargetAddr};
use crate::routing::{Route, Router};
use crate::tunnel::relay;

/// Deadline for dialing the tunnel server or a direct target.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the pac rule file is re-read.
const RULE_RELOAD_INTERVAL: Duration = Duration::from_secs(3600);

/// An established outbound path for one ingress connection.
enum Outbound {
    Direct(TcpStream),
    Tunnel(RecordReader<OwnedReadHalf>, RecordWriter<OwnedWriteHalf>),
}

/// Client endpoint.
#[derive(Clone)]
pub struct Client {
    config: Arc<Config>,
    table: Arc<Table>,
    router: Arc<Router>,
}

impl Client {
    /// Create a client from validated configuration and shared tables.
    pub fn new(config: Config, table: Arc<Table>) -> Self {
        let router = Arc::new(Router::new(config.proxy_mode));
        Self {
            config: Arc::new(config),
            table,
            router,
        }
    }

    /// Bind the local ingress port and serve until the process exits.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.local_port)).await?;
        self.serve(listener).await
    }

    /// Serve ingress connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if self.config.proxy_mode == ProxyMode::Pac {
            self.load_rules().await;
            self.spawn_rule_reload();
        }
        tracing::info!(
            "client on {} -> {} | mode: {:?}",
            listener.local_addr()?,
            self.config.server_address,
            self.config.proxy_mode
        );
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let client = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = client.handle_ingress(stream).await {
                            tracing::debug!("ingress {} error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("accept error: {}", e);
                }
            }
        }
    }

    async fn load_rules(&self) {
        let Some(path) = self.config.rules_path.as_deref() else {
            tracing::warn!("pac mode without rules_path; all traffic will be tunneled");
            return;
        };
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let count = self.router.load_rules(&text);
                tracing::info!("loaded {} merged ranges from {}", count, path);
            }
            Err(e) => {
                tracing::warn!("cannot read rule file {}: {}", path, e);
            }
        }
    }

    fn spawn_rule_reload(&self) {
        if self.config.rules_path.is_none() {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(RULE_RELOAD_INTERVAL).await;
                client.load_rules().await;
            }
        });
    }

    async fn handle_ingress(&self, stream: TcpStream) -> Result<()> {
        // the first byte tells the protocols apart: 0x05 is a SOCKS5 greeting
        let mut first = [0u8; 1];
        if stream.peek(&mut first).await? == 0 {
            return Ok(());
        }
        if first[0] == 0x05 {
            self.handle_socks5(stream).await
        } else {
            self.handle_http(stream).await
        }
    }

    async fn handle_socks5(&self, mut stream: TcpStream) -> Result<()> {
        let target = socks5::read_request(&mut stream).await?;
        match self.dial(&target).await {
            Ok(outbound) => {
                socks5::send_reply(&mut stream, socks5::reply::SUCCESS).await?;
                self.relay(stream, outbound, Vec::new()).await;
                Ok(())
            }
            Err(e) => {
                socks5::send_reply(&mut stream, socks5::reply::HOST_UNREACHABLE).await?;
                Err(e)
            }
        }
    }

    async fn handle_http(&self, mut stream: TcpStream) -> Result<()> {
        let request = http::read_request(&mut stream).await?;
        match self.dial(&request.target).await {
            Ok(outbound) => {
                if request.connect {
                    http::reply_established(&mut stream).await?;
                }
                self.relay(stream, outbound, request.preface).await;
                Ok(())
            }
            Err(e) => {
                http::reply_bad_gateway(&mut stream).await?;
                Err(e)
            }
        }
    }

    async fn relay(&self, local: TcpStream, outbound: Outbound, preface: Vec<u8>) {
        match outbound {
            Outbound::Direct(mut remote) => {
                if !preface.is_empty() && remote.write_all(&preface).await.is_err() {
                    return;
                }
                relay::splice_direct(local, remote).await;
            }
            Outbound::Tunnel(reader, mut writer) => {
                if !preface.is_empty() && writer.write_all(&preface).await.is_err() {
                    return;
                }
                relay::splice_tunnel(local, reader, writer).await;
            }
        }
    }

    /// Apply the routing decision and open the outbound path.
    async fn dial(&self, target: &TargetAddr) -> Result<Outbound> {
        match self.router.decide(target).await {
            Route::Direct => {
                tracing::debug!("{} -> direct", target);
                Ok(Outbound::Direct(dial_tcp(&target.to_string()).await?))
            }
            Route::Proxy => {
                tracing::debug!("{} -> tunnel", target);
                self.dial_tunnel(target).await
            }
        }
    }

    async fn dial_tunnel(&self, target: &TargetAddr) -> Result<Outbound> {
        let stream = dial_tcp(&self.config.server_address).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        let codec_reader = CodecReader::new(
            read_half,
            Arc::clone(&self.table),
            Direction::Duplex,
            false,
        );
        let codec_writer = CodecWriter::new(
            write_half,
            Arc::clone(&self.table),
            Direction::Duplex,
            self.config.padding_min,
            self.config.padding_max,
        );

        let cipher = RecordCipher::new(self.config.aead, &self.config.key);
        let reader = RecordReader::new(codec_reader, cipher.clone());
        let mut writer = RecordWriter::new(codec_writer, cipher);

        writer.write_all(&Handshake::generate().to_bytes()).await?;
        writer.write_all(&target.encode()).await?;

        Ok(Outbound::Tunnel(reader, writer))
    }
}

async fn dial_tcp(addr: &str) -> Result<TcpStream> {
    timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(DIAL_TIMEOUT.as_millis() as u64))?
        .map_err(|e| Error::routing(format!("dial {}: {}", addr, e)))
}
