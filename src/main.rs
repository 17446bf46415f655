//! sudotun binary.
//!
//! Usage: sudotun [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file (default: config.json)
//!   --test               Validate the configuration and exit
//!   -h, --help           Print help information

use std::env;
use std::sync::Arc;
use std::time::Instant;

use sudotun::codec::Table;
use sudotun::config::{Config, Mode};
use sudotun::tunnel::{Client, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — respects RUST_LOG env var (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config_path = String::from("config.json");
    let mut test_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                config_path = args
                    .get(i)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
            }
            "--test" => test_only = true,
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let config = Config::load(&config_path)?;

    if test_only {
        println!("Configuration {} is valid.", config_path);
        println!("Mode: {:?}", config.mode);
        return Ok(());
    }

    let start = Instant::now();
    let table = Arc::new(Table::new(&config.key)?);
    tracing::info!("codec tables ready in {:?}", start.elapsed());

    match config.mode {
        Mode::Client => Client::new(config, table).run().await?,
        Mode::Server => Server::new(config, table).run().await?,
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"sudotun - Sudoku-hint obfuscating tunnel

USAGE:
    sudotun [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Path to configuration file (default: config.json)
    --test               Validate the configuration file and exit
    -h, --help           Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "mode": "client",
        "local_port": 1080,
        "server_address": "203.0.113.7:443",
        "key": "shared-secret",
        "aead": "chacha20-poly1305",
        "padding_min": 16,
        "padding_max": 64,
        "proxy_mode": "pac",
        "rules_path": "cn-ranges.txt"
    }}

EXAMPLES:
    Validate a configuration:
        sudotun --test -c server.json

    Run an endpoint:
        sudotun --config client.json
"#
    );
}
