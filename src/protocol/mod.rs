//! Cleartext tunnel protocol.
//!
//! Inside the record layer, a tunnel stream carries (client to server, in
//! order): a 16-byte handshake, a target address, then raw payload bytes.

mod address;
mod handshake;

pub use address::{Host, TargetAddr, ADDR_DOMAIN, ADDR_IPV4, ADDR_IPV6};
pub use handshake::{unix_now, Handshake, HANDSHAKE_LEN, MAX_CLOCK_SKEW_SECS};
