//! Length-prefixed encrypted record framing.
//!
//! Wire format per record: `len_be_u16 | ciphertext(len) | tag(16)` where
//! `len` counts the ciphertext without the tag and never exceeds 16 KiB.
//! Larger writes split into multiple records; reads buffer leftover
//! plaintext between calls. With the `none` cipher the layer is an identity
//! passthrough and no framing appears on the wire.

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{CodecReader, CodecWriter};
use crate::crypto::cipher::{Nonce, RecordCipher};
use crate::crypto::TAG_SIZE;
use crate::error::{Error, Result};

/// Maximum plaintext carried by one record.
pub const MAX_RECORD_PAYLOAD: usize = 16 * 1024;

/// Writing half of the record layer.
pub struct RecordWriter<W> {
    inner: CodecWriter<W>,
    cipher: RecordCipher,
    nonce: Nonce,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    /// Wrap the obfuscated stream's writing half.
    pub fn new(inner: CodecWriter<W>, cipher: RecordCipher) -> Self {
        Self {
            inner,
            cipher,
            nonce: Nonce::zero(),
        }
    }

    /// Encrypt and write the whole buffer, splitting into records as needed.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.cipher.is_plain() {
            return self.inner.write_all(data).await;
        }
        for chunk in data.chunks(MAX_RECORD_PAYLOAD) {
            let sealed = self.cipher.seal(&self.nonce, chunk)?;
            self.nonce.increment();

            let body_len = sealed.len() - TAG_SIZE;
            let mut record = Vec::with_capacity(2 + sealed.len());
            record.extend_from_slice(&(body_len as u16).to_be_bytes());
            record.extend_from_slice(&sealed);
            self.inner.write_all(&record).await?;
        }
        Ok(())
    }

    /// Shut down the underlying transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await
    }

    /// Release the obfuscated writing half.
    pub fn into_inner(self) -> CodecWriter<W> {
        self.inner
    }
}

/// Reading half of the record layer.
pub struct RecordReader<R> {
    inner: CodecReader<R>,
    cipher: RecordCipher,
    nonce: Nonce,
    pending: Bytes,
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    /// Wrap the obfuscated stream's reading half.
    pub fn new(inner: CodecReader<R>, cipher: RecordCipher) -> Self {
        Self {
            inner,
            cipher,
            nonce: Nonce::zero(),
            pending: Bytes::new(),
        }
    }

    /// Read decrypted bytes. `Ok(0)` means EOF on a record boundary.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.cipher.is_plain() {
            return self.inner.read(buf).await;
        }

        while self.pending.is_empty() {
            let mut header = [0u8; 2];
            if self.inner.read(&mut header[..1]).await? == 0 {
                return Ok(0);
            }
            self.inner.read_exact(&mut header[1..]).await?;

            let len = u16::from_be_bytes(header) as usize;
            if len > MAX_RECORD_PAYLOAD {
                return Err(Error::crypto("oversized record"));
            }

            let mut sealed = vec![0u8; len + TAG_SIZE];
            self.inner.read_exact(&mut sealed).await?;

            let plain = self.cipher.open(&self.nonce, &sealed)?;
            self.nonce.increment();
            self.pending = Bytes::from(plain);
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    /// Read exactly `buf.len()` decrypted bytes.
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

    /// Stop the obfuscated layer's wire capture.
    pub fn stop_recording(&mut self) {
        self.inner.stop_recording();
    }

    /// Release the obfuscated reading half.
    pub fn into_inner(self) -> CodecReader<R> {
        self.inner
    }
}
