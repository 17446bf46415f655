//! Obfuscated byte stream.
//!
//! `CodecWriter` turns each plaintext byte into one 4-byte hint tuple chosen
//! uniformly from the encode table, prefixed per flush with a random run of
//! padding-pool bytes. `CodecReader` performs the inverse with a streaming
//! 4-byte reassembly window, discarding pool bytes wherever they appear.
//!
//! The reader can record every raw wire byte it consumes, pre-codec, so a
//! failed handshake can replay the peer's exact traffic to a decoy.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::table::Table;
use crate::crypto::SecureRandom;
use crate::error::{Error, Result};

/// Abort decoding once this many consecutive wire bytes produce no output.
///
/// Bounds read amplification on adversarial input: without it a peer could
/// stream noise forever while the decoder spins emitting nothing.
pub const SLIDE_LIMIT: usize = 4096;

const READ_CHUNK: usize = 2048;

/// Which directions of a connection the codec applies to.
///
/// A one-sided mode lets an obfuscated path coexist with a plain one; the
/// inactive side is a transparent passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Obfuscate writes and de-obfuscate reads
    Duplex,
    /// Obfuscate writes; reads pass through untouched
    EncodeOnly,
    /// De-obfuscate reads; writes pass through untouched
    DecodeOnly,
}

impl Direction {
    fn encodes(self) -> bool {
        matches!(self, Direction::Duplex | Direction::EncodeOnly)
    }

    fn decodes(self) -> bool {
        matches!(self, Direction::Duplex | Direction::DecodeOnly)
    }
}

/// Writing half of the obfuscated stream.
pub struct CodecWriter<W> {
    inner: W,
    table: Arc<Table>,
    encode: bool,
    pad_min: u32,
    pad_max: u32,
}

impl<W: AsyncWrite + Unpin> CodecWriter<W> {
    /// Wrap a raw transport half.
    pub fn new(inner: W, table: Arc<Table>, direction: Direction, pad_min: u32, pad_max: u32) -> Self {
        Self {
            inner,
            table,
            encode: direction.encodes(),
            pad_min,
            pad_max,
        }
    }

    /// Obfuscate and write the whole buffer as one flush.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if !self.encode {
            self.inner.write_all(data).await?;
            self.inner.flush().await?;
            return Ok(());
        }

        let mut rng = SecureRandom::rng();
        let pad = if self.pad_max > self.pad_min {
            rng.gen_range(self.pad_min..=self.pad_max) as usize
        } else {
            self.pad_min as usize
        };

        let mut wire = Vec::with_capacity(pad + data.len() * 4);
        let pool = self.table.padding_pool();
        for _ in 0..pad {
            wire.push(*pool.choose(&mut rng).expect("pool is never empty"));
        }
        for &byte in data {
            let tuple = self
                .table
                .tuples_for(byte)
                .choose(&mut rng)
                .expect("table construction guarantees a tuple per byte");
            wire.extend_from_slice(tuple);
        }

        self.inner.write_all(&wire).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the underlying transport half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Release the raw transport half.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reading half of the obfuscated stream.
pub struct CodecReader<R> {
    inner: R,
    table: Arc<Table>,
    decode: bool,
    window: [u8; 4],
    window_len: usize,
    decoded: BytesMut,
    run: usize,
    capture: Vec<u8>,
    recording: bool,
}

impl<R: AsyncRead + Unpin> CodecReader<R> {
    /// Wrap a raw transport half.
    ///
    /// With `recording` on, every raw byte read from the wire is captured
    /// pre-codec until [`stop_recording`](Self::stop_recording).
    pub fn new(inner: R, table: Arc<Table>, direction: Direction, recording: bool) -> Self {
        Self {
            inner,
            table,
            decode: direction.decodes(),
            window: [0; 4],
            window_len: 0,
            decoded: BytesMut::new(),
            run: 0,
            capture: Vec::new(),
            recording,
        }
    }

    /// Read de-obfuscated bytes. `Ok(0)` means EOF.
    ///
    /// EOF with a partial tuple in the window is reported as clean EOF: the
    /// peer hanging up mid-tuple is a transport event, not a codec one.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.decode {
            let n = self.inner.read(buf).await?;
            if self.recording {
                self.capture.extend_from_slice(&buf[..n]);
            }
            return Ok(n);
        }

        loop {
            if !self.decoded.is_empty() {
                let n = self.decoded.len().min(buf.len());
                buf[..n].copy_from_slice(&self.decoded.split_to(n));
                return Ok(n);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Ok(0);
            }
            if self.recording {
                self.capture.extend_from_slice(&chunk[..n]);
            }
            for &byte in &chunk[..n] {
                self.consume(byte)?;
            }
        }
    }

    /// Read exactly `buf.len()` de-obfuscated bytes.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(Error::Network(std::io::ErrorKind::UnexpectedEof.into()));
            }
            filled += n;
        }
        Ok(())
    }

    fn consume(&mut self, byte: u8) -> Result<()> {
        if self.table.is_padding(byte) {
            return self.bump_run();
        }
        self.window[self.window_len] = byte;
        self.window_len += 1;
        if self.window_len < 4 {
            return self.bump_run();
        }
        match self.table.decode_window(&self.window) {
            Some(plain) => {
                self.decoded.put_u8(plain);
                self.window_len = 0;
                self.run = 0;
                Ok(())
            }
            None => {
                // resynchronization noise or corruption: slide forward one
                self.window.copy_within(1.., 0);
                self.window_len = 3;
                self.bump_run()
            }
        }
    }

    fn bump_run(&mut self) -> Result<()> {
        self.run += 1;
        if self.run > SLIDE_LIMIT {
            return Err(Error::codec("no decodable hint tuple within slide limit"));
        }
        Ok(())
    }

    /// Stop populating the capture buffer. Already-captured bytes stay
    /// available through [`into_parts`](Self::into_parts).
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    /// Release the raw transport half and the recorded wire bytes.
    ///
    /// The capture holds every byte read from the wire in order, including
    /// any still sitting in the reassembly window.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.inner, self.capture)
    }
}
