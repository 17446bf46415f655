//! Connection lifecycle.
//!
//! The client and server endpoints, the anti-probe fallback, and the
//! relay plumbing shared between them. Each accepted connection runs as
//! its own task group and is an independent failure domain.

mod client;
mod fallback;
mod relay;
mod server;

pub use client::Client;
pub use server::Server;
