//! Record ciphers and counter nonces.

use aes_gcm::Aes128Gcm;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::AeadKind;
use crate::crypto::{AES_KEY_SIZE, CHACHA_KEY_SIZE, NONCE_SIZE};
use crate::error::{Error, Result};

/// A counter nonce for record encryption.
///
/// Each direction owns one, starting at zero and incremented after every
/// record. The counter occupies the trailing 8 bytes, little-endian.
#[derive(Clone, Copy, Debug)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// The zero nonce every direction starts from.
    pub fn zero() -> Self {
        Self([0u8; NONCE_SIZE])
    }

    /// Create a nonce with a specific counter value.
    pub fn new(counter: u64) -> Self {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[4..12].copy_from_slice(&counter.to_le_bytes());
        Self(nonce)
    }

    /// Get the raw nonce bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Get the current counter value (for diagnostics).
    pub fn counter(&self) -> u64 {
        u64::from_le_bytes(self.0[4..12].try_into().expect("slice is 8 bytes"))
    }

    /// Increment the counter portion of the nonce.
    pub fn increment(&mut self) {
        let counter = self.counter().wrapping_add(1);
        self.0[4..12].copy_from_slice(&counter.to_le_bytes());
    }
}

/// Cipher applied to each record.
#[derive(Clone)]
pub enum RecordCipher {
    /// AES-128-GCM keyed by the 16-byte SHA-256 prefix of the shared key
    Aes128Gcm(Box<Aes128Gcm>),
    /// ChaCha20-Poly1305 keyed by the 32-byte SHA-256 prefix
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
    /// No cipher; the record layer becomes an identity passthrough
    Plain,
}

impl RecordCipher {
    /// Build the configured cipher from the shared key string.
    pub fn new(kind: AeadKind, key: &str) -> Self {
        match kind {
            AeadKind::Aes128Gcm => {
                let key = derive_key(key, AES_KEY_SIZE);
                let cipher =
                    Aes128Gcm::new_from_slice(&key).expect("derived key has the cipher's size");
                RecordCipher::Aes128Gcm(Box::new(cipher))
            }
            AeadKind::ChaCha20Poly1305 => {
                let key = derive_key(key, CHACHA_KEY_SIZE);
                let cipher = ChaCha20Poly1305::new_from_slice(&key)
                    .expect("derived key has the cipher's size");
                RecordCipher::ChaCha20Poly1305(Box::new(cipher))
            }
            AeadKind::None => RecordCipher::Plain,
        }
    }

    /// Whether this cipher is the identity passthrough.
    pub fn is_plain(&self) -> bool {
        matches!(self, RecordCipher::Plain)
    }

    /// Encrypt one record. Returns ciphertext with the tag appended.
    pub fn seal(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            RecordCipher::Aes128Gcm(cipher) => cipher
                .encrypt(nonce.as_bytes().into(), plaintext)
                .map_err(|_| Error::crypto("record seal failed")),
            RecordCipher::ChaCha20Poly1305(cipher) => cipher
                .encrypt(nonce.as_bytes().into(), plaintext)
                .map_err(|_| Error::crypto("record seal failed")),
            RecordCipher::Plain => Ok(plaintext.to_vec()),
        }
    }

    /// Decrypt and authenticate one record.
    pub fn open(&self, nonce: &Nonce, sealed: &[u8]) -> Result<Vec<u8>> {
        match self {
            RecordCipher::Aes128Gcm(cipher) => cipher
                .decrypt(nonce.as_bytes().into(), sealed)
                .map_err(|_| Error::crypto("record authentication failed")),
            RecordCipher::ChaCha20Poly1305(cipher) => cipher
                .decrypt(nonce.as_bytes().into(), sealed)
                .map_err(|_| Error::crypto("record authentication failed")),
            RecordCipher::Plain => Ok(sealed.to_vec()),
        }
    }
}

/// Truncated SHA-256 of the shared key.
fn derive_key(key: &str, len: usize) -> Zeroizing<Vec<u8>> {
    let digest = Sha256::digest(key.as_bytes());
    Zeroizing::new(digest[..len].to_vec())
}
