//! Server endpoint.
//!
//! Per accepted connection: wrap in the codec (recording on) and the record
//! layer, read the 16-byte handshake under a deadline, and branch. A fresh
//! handshake stops the recording, reads the target address, dials it, and
//! relays; anything else goes to fallback with the recorded bytes.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::codec::{CodecReader, CodecWriter, Direction, Table};
use crate::config::Config;
use crate::crypto::{RecordCipher, RecordReader, RecordWriter};
use crate::error::{Error, Result};
use crate::protocol::{Handshake, TargetAddr, HANDSHAKE_LEN};
use crate::tunnel::{fallback, relay};

/// Deadline for receiving the handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for dialing the requested target.
const TARGET_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Server endpoint.
#[derive(Clone)]
pub struct Server {
    config: Arc<Config>,
    table: Arc<Table>,
}

impl Server {
    /// Create a server from validated configuration and shared tables.
    pub fn new(config: Config, table: Arc<Table>) -> Self {
        Self {
            config: Arc::new(config),
            table,
        }
    }

    /// Bind the configured port and serve until the process exits.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.local_port)).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            "server on {} (fallback: {})",
            listener.local_addr()?,
            if self.config.fallback_address.is_empty() {
                "none"
            } else {
                self.config.fallback_address.as_str()
            }
        );
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_conn(stream).await {
                            tracing::debug!("connection {} error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("accept error: {}", e);
                }
            }
        }
    }

    async fn handle_conn(&self, stream: TcpStream) -> Result<()> {
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        // record the raw wire until the handshake proves the peer legitimate
        let codec_reader = CodecReader::new(
            read_half,
            Arc::clone(&self.table),
            Direction::Duplex,
            true,
        );
        let codec_writer = CodecWriter::new(
            write_half,
            Arc::clone(&self.table),
            Direction::Duplex,
            self.config.padding_min,
            self.config.padding_max,
        );

        let cipher = RecordCipher::new(self.config.aead, &self.config.key);
        let mut reader = RecordReader::new(codec_reader, cipher.clone());
        let writer = RecordWriter::new(codec_writer, cipher);

        let mut raw = [0u8; HANDSHAKE_LEN];
        let verdict = match timeout(HANDSHAKE_TIMEOUT, reader.read_exact(&mut raw)).await {
            Err(_) => Err(Error::handshake("handshake deadline exceeded")),
            Ok(Err(e)) => Err(Error::handshake(format!("handshake read: {}", e))),
            Ok(Ok(())) => Handshake::from_bytes(&raw).validate(),
        };

        if let Err(e) = verdict {
            if e.is_suspicious() {
                tracing::warn!("suspicious peer: {}", e);
                return fallback::handle_suspicious(
                    reader.into_inner(),
                    writer.into_inner(),
                    &self.config,
                )
                .await;
            }
            return Err(e);
        }

        reader.stop_recording();

        let target = TargetAddr::read_from(&mut reader).await?;
        tracing::debug!("tunnel -> {}", target);

        let upstream = timeout(TARGET_DIAL_TIMEOUT, TcpStream::connect(target.to_string()))
            .await
            .map_err(|_| Error::Timeout(TARGET_DIAL_TIMEOUT.as_millis() as u64))?
            .map_err(|e| Error::routing(format!("dial {}: {}", target, e)))?;

        relay::splice_tunnel(upstream, reader, writer).await;
        Ok(())
    }
}
