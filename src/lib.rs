//! # sudotun
//!
//! A TCP tunneling proxy that disguises an encrypted byte stream as a
//! sequence of Sudoku puzzle hints, defeating protocol fingerprinting while
//! preserving reliable bidirectional transport.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   Ingress (SOCKS5 / HTTP)  ·  Routing (global/pac)      │
//! ├─────────────────────────────────────────────────────────┤
//! │   Tunnel protocol (handshake, target address, fallback) │
//! ├─────────────────────────────────────────────────────────┤
//! │   Record layer (AES-128-GCM / ChaCha20-Poly1305 / none) │
//! ├─────────────────────────────────────────────────────────┤
//! │   Sudoku codec (hint tuples + padding pool)             │
//! ├─────────────────────────────────────────────────────────┤
//! │   Raw TCP                                                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Goals
//!
//! 1. **Unobservability**: every plaintext byte leaves the wire as a 4-byte
//!    grid clue interleaved with decoy padding; nothing on the wire repeats
//!    across keys
//! 2. **Probe resistance**: a peer that fails the handshake is replayed,
//!    byte-exactly, to an ordinary decoy server
//! 3. **Containment**: each connection is its own failure domain; no
//!    per-connection error takes the process down

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ingress;
pub mod protocol;
pub mod routing;
pub mod tunnel;

pub use error::{Error, Result};
