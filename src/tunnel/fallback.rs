//! Anti-probe fallback.
//!
//! A connection that fails the handshake is either tarpitted or handed to a
//! decoy upstream. In the decoy case the server first replays every raw
//! byte the peer has sent so far, then splices the two sockets; the decoy
//! therefore observes exactly the byte sequence the prober produced, which
//! is what makes this server indistinguishable from the decoy.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::codec::{CodecReader, CodecWriter};
use crate::config::{Config, SuspiciousAction};
use crate::error::{Error, Result};

/// Deadline for dialing the decoy.
const DECOY_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a silent-mode connection is drained before closing.
const TARPIT_DURATION: Duration = Duration::from_secs(5);

/// Dispose of a connection that failed the handshake.
pub async fn handle_suspicious(
    reader: CodecReader<OwnedReadHalf>,
    writer: CodecWriter<OwnedWriteHalf>,
    config: &Config,
) -> Result<()> {
    let (read_half, recorded) = reader.into_parts();
    let write_half = writer.into_inner();
    let mut peer = read_half
        .reunite(write_half)
        .map_err(|_| Error::handshake("connection halves from different sockets"))?;

    if config.suspicious_action == SuspiciousAction::Silent {
        tarpit(&mut peer).await;
        return Ok(());
    }

    if config.fallback_address.is_empty() {
        return Ok(());
    }

    tracing::info!("fallback -> {}", config.fallback_address);
    let mut decoy =
        match timeout(DECOY_DIAL_TIMEOUT, TcpStream::connect(&config.fallback_address)).await {
            Ok(Ok(stream)) => stream,
            // decoy unreachable; dropping the peer is all that is left
            _ => return Ok(()),
        };

    if !recorded.is_empty() {
        decoy.write_all(&recorded).await?;
    }

    let _ = tokio::io::copy_bidirectional(&mut peer, &mut decoy).await;
    Ok(())
}

/// Read and discard for the tarpit window, then drop the connection.
async fn tarpit(peer: &mut TcpStream) {
    let mut sink = [0u8; 1024];
    let _ = timeout(TARPIT_DURATION, async {
        loop {
            match peer.read(&mut sink).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
}
