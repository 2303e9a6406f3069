//! Stream collector CLI.
//!
//! `listen` runs the collector and prints `Number <value>` lines on stdout.
//! `send` pushes numbers (or raw bytes) into a running collector. Logs go to
//! stderr so stdout carries records only.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stream_collector::record::parse_decimal;
use stream_collector::socket::client;
use stream_collector::{CollectorConfig, CollectorServer, LinePrinter};
use tokio::sync::watch;

// CLI
#[derive(Parser, Debug)]
#[command(name = "stream-collector")]
#[command(version)]
#[command(about = "Collects bytes from a Unix socket and prints 32-byte little-endian records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen on the socket and print every decoded record
    Listen {
        /// Socket path (overrides config and COLLECTOR_SOCKET)
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Bytes requested per read
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Send numbers as records, or raw bytes from a file, to a collector
    Send {
        /// Socket path (overrides config and COLLECTOR_SOCKET)
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Send this file's raw bytes instead of numbers ("-" for stdin)
        #[arg(long, conflicts_with = "numbers")]
        file: Option<PathBuf>,
        /// Unsigned decimal integers, one record each
        numbers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let mut config = CollectorConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Listen { socket, chunk_size } => {
            if let Some(socket) = socket {
                config.socket_path = socket;
            }
            if let Some(chunk_size) = chunk_size {
                config.read_chunk_size = chunk_size;
            }
            listen(&config).await?;
        }
        Commands::Send {
            socket,
            file,
            numbers,
        } => {
            if let Some(socket) = socket {
                config.socket_path = socket;
            }
            send(&config, file, &numbers).await?;
        }
    }

    Ok(())
}

/// Bind, then serve until SIGINT/SIGTERM.
async fn listen(config: &CollectorConfig) -> Result<()> {
    let server = CollectorServer::bind(config).context("Collector could not start")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_termination().await;
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut sink = LinePrinter::stdout();
    server.run(&mut sink, shutdown_rx).await?;
    Ok(())
}

async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Cannot install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

async fn send(config: &CollectorConfig, file: Option<PathBuf>, numbers: &[String]) -> Result<()> {
    let socket_path = &config.socket_path;

    let sent = match file {
        Some(file) => {
            let bytes = read_input(&file)?;
            client::send_bytes(socket_path, &bytes).await?
        }
        None => {
            let values = numbers
                .iter()
                .map(|n| parse_decimal(n))
                .collect::<stream_collector::Result<Vec<_>>>()?;
            client::send_records(socket_path, &values).await?
        }
    };

    log::info!("Done: {} bytes", sent);
    Ok(())
}

fn read_input(file: &Path) -> Result<Vec<u8>> {
    if file.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read stdin")?;
        Ok(bytes)
    } else {
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))
    }
}
