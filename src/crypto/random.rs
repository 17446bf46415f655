//! Secure random number generation.
//!
//! Wraps the OS entropy source. Used for hint-tuple selection, padding
//! lengths, and handshake nonces; the deterministic table shuffle uses its
//! own seeded RNG instead.

use rand::{CryptoRng, RngCore};
use rand_core::OsRng;

/// Cryptographically secure random number generator.
pub struct SecureRandom;

impl SecureRandom {
    /// Fill a buffer with cryptographically secure random bytes.
    pub fn fill(dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }

    /// Generate a fixed-size array of random bytes.
    pub fn bytes<const N: usize>() -> [u8; N] {
        let mut buf = [0u8; N];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    /// Get an RNG instance that implements CryptoRng.
    pub fn rng() -> impl RngCore + CryptoRng {
        OsRng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_produces_entropy() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        SecureRandom::fill(&mut a);
        SecureRandom::fill(&mut b);
        assert_ne!(a, b);
        assert!(!a.iter().all(|&x| x == 0));
    }

    #[test]
    fn test_bytes_are_distinct() {
        let a: [u8; 16] = SecureRandom::bytes();
        let b: [u8; 16] = SecureRandom::bytes();
        assert_ne!(a, b);
    }
}
