//! Session handshake record.
//!
//! Exactly 16 bytes: a big-endian unix-seconds timestamp followed by 8
//! random bytes. The server accepts a timestamp within one minute of its
//! own clock; anything else marks the connection as suspicious.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::SecureRandom;
use crate::error::{Error, Result};

/// Serialized handshake length in bytes.
pub const HANDSHAKE_LEN: usize = 16;

/// Maximum tolerated clock skew in seconds.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Client handshake record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    timestamp: u64,
    nonce: [u8; 8],
}

impl Handshake {
    /// Build a fresh handshake stamped with the current time.
    pub fn generate() -> Self {
        Self {
            timestamp: unix_now(),
            nonce: SecureRandom::bytes(),
        }
    }

    /// Build a handshake with an explicit timestamp.
    pub fn with_timestamp(timestamp: u64) -> Self {
        Self {
            timestamp,
            nonce: SecureRandom::bytes(),
        }
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut raw = [0u8; HANDSHAKE_LEN];
        raw[..8].copy_from_slice(&self.timestamp.to_be_bytes());
        raw[8..].copy_from_slice(&self.nonce);
        raw
    }

    /// Parse from the wire format.
    pub fn from_bytes(raw: &[u8; HANDSHAKE_LEN]) -> Self {
        Self {
            timestamp: u64::from_be_bytes(raw[..8].try_into().expect("slice is 8 bytes")),
            nonce: raw[8..].try_into().expect("slice is 8 bytes"),
        }
    }

    /// The embedded timestamp, unix seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Whether the timestamp is within the accepted skew of `now`.
    pub fn is_fresh(&self, now: u64) -> bool {
        now.abs_diff(self.timestamp) <= MAX_CLOCK_SKEW_SECS
    }

    /// Check freshness against the wall clock.
    pub fn validate(&self) -> Result<()> {
        if self.is_fresh(unix_now()) {
            Ok(())
        } else {
            Err(Error::handshake("timestamp outside the accepted window"))
        }
    }
}

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        let handshake = Handshake::generate();
        let raw = handshake.to_bytes();
        assert_eq!(Handshake::from_bytes(&raw), handshake);
    }

    #[test]
    fn test_wire_layout() {
        let handshake = Handshake::with_timestamp(0x0102030405060708);
        let raw = handshake.to_bytes();
        assert_eq!(&raw[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_freshness_window() {
        let now = unix_now();
        assert!(Handshake::with_timestamp(now).is_fresh(now));
        assert!(Handshake::with_timestamp(now - 60).is_fresh(now));
        assert!(Handshake::with_timestamp(now + 60).is_fresh(now));
        assert!(!Handshake::with_timestamp(now - 120).is_fresh(now));
        assert!(!Handshake::with_timestamp(now + 120).is_fresh(now));
    }

    #[test]
    fn test_validate_against_wall_clock() {
        assert!(Handshake::generate().validate().is_ok());
        assert!(Handshake::with_timestamp(unix_now() - 120).validate().is_err());
    }

    #[test]
    fn test_nonces_vary() {
        let a = Handshake::generate();
        let b = Handshake::generate();
        assert_ne!(a.to_bytes()[8..], b.to_bytes()[8..]);
    }
}
