//! kvdb Server Binary
//!
//! Replays the WAL, then starts the TCP server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use kvdb::config::{WalSyncStrategy, DEFAULT_LOG_FILE_PATH, DEFAULT_PORT};
use kvdb::network::Server;
use kvdb::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// kvdb Server
#[derive(Parser, Debug)]
#[command(name = "kvdb-server")]
#[command(about = "Minimal networked key-value store with a write-ahead log")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Write-ahead log file (created if missing, replayed on startup)
    #[arg(long, default_value = DEFAULT_LOG_FILE_PATH)]
    log_file_path: PathBuf,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// fsync the WAL after every record
    #[arg(long)]
    fsync: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse_from(known_args(std::env::args().collect()));

    tracing::info!("kvdb server v{}", kvdb::VERSION);
    tracing::info!("WAL file: {}", args.log_file_path.display());

    let sync_strategy = if args.fsync {
        WalSyncStrategy::EveryWrite
    } else {
        WalSyncStrategy::OsBuffer
    };

    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .log_file_path(&args.log_file_path)
        .wal_sync_strategy(sync_strategy)
        .build();

    // Replay happens here; a damaged log stops the process
    let engine = match Engine::open(&config) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized with {} keys", engine.len());

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind listener: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Drop (with a warning) every argument clap would reject as unknown
fn known_args(raw: Vec<String>) -> Vec<String> {
    let command = Args::command();
    let mut tokens = raw.into_iter().peekable();
    let mut kept: Vec<String> = tokens.next().into_iter().collect();

    while let Some(token) = tokens.next() {
        let name = token.split('=').next().unwrap_or(&token).to_string();

        match flag_takes_value(&command, &name) {
            Some(takes_value) => {
                let inline_value = token.contains('=');
                kept.push(token);
                // A missing value is left for clap to report
                if takes_value && !inline_value {
                    if let Some(value) = tokens.next_if(|next| !next.starts_with("--")) {
                        kept.push(value);
                    }
                }
            }
            None => tracing::warn!("Ignoring unrecognized argument '{}'", token),
        }
    }

    kept
}

/// `Some(takes_value)` for a known long flag, `None` otherwise
fn flag_takes_value(command: &clap::Command, name: &str) -> Option<bool> {
    if matches!(name, "-h" | "--help" | "-V" | "--version") {
        return Some(false);
    }

    let long = name.strip_prefix("--")?;
    command
        .get_arguments()
        .find(|arg| arg.get_long() == Some(long))
        .map(|arg| arg.get_action().takes_values())
}
