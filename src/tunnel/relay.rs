//! Bidirectional byte relays.
//!
//! Each relayed pair runs as two independent tasks, one per direction, so
//! reads and writes suspend independently. Within a direction the relay is
//! strictly FIFO and byte-exact. Half-close propagates: EOF on one side
//! shuts down the matching write half, and the peer's own EOF unwinds the
//! opposite direction.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::crypto::{RecordReader, RecordWriter};

const BUF_SIZE: usize = 16 * 1024;

/// Splice a plain socket with a tunnel reader/writer pair until both
/// directions finish.
pub async fn splice_tunnel(
    plain: TcpStream,
    mut tunnel_reader: RecordReader<OwnedReadHalf>,
    mut tunnel_writer: RecordWriter<OwnedWriteHalf>,
) {
    let (mut plain_reader, mut plain_writer) = plain.into_split();

    let uplink = tokio::spawn(async move {
        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            match plain_reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tunnel_writer.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = tunnel_writer.shutdown().await;
    });

    let downlink = tokio::spawn(async move {
        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            match tunnel_reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if plain_writer.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = plain_writer.shutdown().await;
    });

    let _ = tokio::join!(uplink, downlink);
}

/// Splice two plain sockets.
pub async fn splice_direct(mut a: TcpStream, mut b: TcpStream) {
    let _ = tokio::io::copy_bidirectional(&mut a, &mut b).await;
}
