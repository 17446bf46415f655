//! Runtime configuration.
//!
//! Loaded from a JSON file. Configuration problems are fatal at startup; the
//! process exits non-zero rather than running with a partial setup.

use serde::Deserialize;

use crate::codec::SLIDE_LIMIT;
use crate::error::{Error, Result};

/// Which endpoint this process runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Local proxy that tunnels traffic to a server
    Client,
    /// Remote endpoint that dials targets on behalf of clients
    Server,
}

/// Cipher applied by the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum AeadKind {
    /// AES-128-GCM
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    /// ChaCha20-Poly1305
    #[default]
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
    /// No record encryption; the record layer passes bytes through
    #[serde(rename = "none")]
    None,
}

/// What the server does with a connection that fails the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspiciousAction {
    /// Replay the recorded bytes to the decoy upstream and keep proxying
    #[default]
    Fallback,
    /// Drain the peer for a few seconds, then close; never contact the decoy
    Silent,
}

/// Client routing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Everything goes through the tunnel
    #[default]
    Global,
    /// Everything is dialed directly
    Direct,
    /// Destinations inside the local-region IP table are dialed directly
    Pac,
}

/// Runtime configuration for either endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Role of this process
    pub mode: Mode,
    /// Local ingress port (client) or accept port (server)
    pub local_port: u16,
    /// Remote tunnel endpoint as `host:port` (client)
    #[serde(default)]
    pub server_address: String,
    /// Decoy upstream as `host:port` for suspicious connections (server)
    #[serde(default)]
    pub fallback_address: String,
    /// Shared secret; seeds the codec tables and the record cipher key
    pub key: String,
    /// Record cipher
    #[serde(default)]
    pub aead: AeadKind,
    /// Handling of failed handshakes (server)
    #[serde(default)]
    pub suspicious_action: SuspiciousAction,
    /// Minimum padding bytes per outbound flush
    #[serde(default)]
    pub padding_min: u32,
    /// Maximum padding bytes per outbound flush
    #[serde(default)]
    pub padding_max: u32,
    /// Routing policy (client)
    #[serde(default)]
    pub proxy_mode: ProxyMode,
    /// Path to a CIDR list file consulted in pac mode (client)
    #[serde(default)]
    pub rules_path: Option<String>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path, e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("cannot parse {}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::config("key cannot be empty"));
        }
        if self.local_port == 0 {
            return Err(Error::config("local_port cannot be 0"));
        }
        if self.mode == Mode::Client && self.server_address.is_empty() {
            return Err(Error::config("client mode requires server_address"));
        }
        if self.padding_min > self.padding_max {
            return Err(Error::config(format!(
                "padding_min {} exceeds padding_max {}",
                self.padding_min, self.padding_max
            )));
        }
        // A flush whose padding alone exceeds the decoder's resync budget
        // would make a well-behaved peer look like an attacker.
        if self.padding_max as usize >= SLIDE_LIMIT {
            return Err(Error::config(format!(
                "padding_max must be below {}",
                SLIDE_LIMIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_client_config() {
        let config = parse(
            r#"{
                "mode": "client",
                "local_port": 1080,
                "server_address": "203.0.113.7:443",
                "key": "hello"
            }"#,
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.aead, AeadKind::ChaCha20Poly1305);
        assert_eq!(config.proxy_mode, ProxyMode::Global);
        assert_eq!(config.suspicious_action, SuspiciousAction::Fallback);
        assert_eq!(config.padding_max, 0);
    }

    #[test]
    fn test_server_config_with_fallback() {
        let config = parse(
            r#"{
                "mode": "server",
                "local_port": 443,
                "fallback_address": "127.0.0.1:8080",
                "key": "hello",
                "aead": "aes-128-gcm",
                "suspicious_action": "silent",
                "padding_min": 16,
                "padding_max": 64
            }"#,
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, Mode::Server);
        assert_eq!(config.aead, AeadKind::Aes128Gcm);
        assert_eq!(config.suspicious_action, SuspiciousAction::Silent);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = parse(
            r#"{"mode": "client", "local_port": 1080, "server_address": "s:1", "key": "k"}"#,
        );

        config.key.clear();
        assert!(config.validate().is_err());
        config.key = "k".into();

        config.server_address.clear();
        assert!(config.validate().is_err());
        config.server_address = "s:1".into();

        config.padding_min = 10;
        config.padding_max = 5;
        assert!(config.validate().is_err());

        config.padding_min = 0;
        config.padding_max = SLIDE_LIMIT as u32;
        assert!(config.validate().is_err());
    }
}
