//! emberkv server entry point.
//!
//! Parses the command line, wires logging to stdout and a log file,
//! starts the active expirer, and accepts connections until Ctrl+C.

use emberkv::commands::CommandHandler;
use emberkv::connection::{handle_connection, ConnectionStats};
use emberkv::storage::{start_expirer, Keyspace};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::FmtSubscriber;

/// Server configuration.
struct Config {
    /// Address to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Log file path, written in addition to stdout
    log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: emberkv::DEFAULT_HOST.to_string(),
            port: emberkv::DEFAULT_PORT,
            log_file: emberkv::DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Config {
    /// Parses configuration from command-line arguments.
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--log-file" => {
                    if i + 1 < args.len() {
                        config.log_file = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --log-file requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("emberkv version {}", emberkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
emberkv - An In-Memory, RESP-Compatible Key-Value Server

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Address to bind to (default: 0.0.0.0)
    -p, --port <PORT>        Port to listen on (default: 6379)
        --log-file <PATH>    Log file, written in addition to stdout
                             (default: emberkv.log)
    -v, --version            Print version information
        --help               Print this help message

CONNECTING:
    Use redis-cli or any Redis client:
    $ redis-cli -p 6379
    127.0.0.1:6379> PING
    PONG
    127.0.0.1:6379> SET greeting hello
    OK
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Log lines go to stdout and to the (truncated) log file.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&config.log_file)?;
    let writer = std::io::stdout.and(Arc::new(log_file));
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    // The one shared data structure, handed to every connection task.
    let store = Arc::new(Keyspace::new());

    let _expirer = start_expirer(Arc::clone(&store));

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("listening on {}", config.bind_address());

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("shutdown signal received, stopping server");
    };

    tokio::select! {
        _ = accept_loop(listener, store, stats) => {}
        _ = shutdown => {}
    }

    info!("server shutdown complete");
    Ok(())
}

/// Accepts connections forever, spawning one task per client.
async fn accept_loop(listener: TcpListener, store: Arc<Keyspace>, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let commands = CommandHandler::new(Arc::clone(&store));
                let stats = Arc::clone(&stats);
                tokio::spawn(handle_connection(stream, addr, commands, stats));
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
