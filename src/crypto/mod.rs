//! Record-layer cryptography.
//!
//! This module provides:
//! - the record ciphers (AES-128-GCM, ChaCha20-Poly1305, or none)
//! - per-direction 96-bit counter nonces
//! - length-prefixed encrypted record framing over the obfuscated stream
//! - secure random number generation
//!
//! Key derivation is deliberately HKDF-free: each cipher takes the
//! appropriate prefix of SHA-256 over the shared key string.

mod cipher;
mod random;
mod record;

pub use cipher::{Nonce, RecordCipher};
pub use random::SecureRandom;
pub use record::{RecordReader, RecordWriter, MAX_RECORD_PAYLOAD};

/// Size of the AEAD authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the AEAD nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// AES-128-GCM key size in bytes
pub const AES_KEY_SIZE: usize = 16;

/// ChaCha20-Poly1305 key size in bytes
pub const CHACHA_KEY_SIZE: usize = 32;
