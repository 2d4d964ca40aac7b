//! # emberkv - An In-Memory, RESP-Compatible Key-Value Server
//!
//! emberkv speaks a subset of the RESP wire protocol over TCP. Clients
//! connect with any Redis client, issue commands against a shared
//! keyspace of string and list values, and may attach absolute
//! expirations to keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           emberkv                            │
//! │                                                              │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────────┐        │
//! │  │ TCP accept │──>│ Connection │──>│ CommandHandler │        │
//! │  │   loop     │   │  (1 task   │   │  (dispatch)    │        │
//! │  └────────────┘   │ per client)│   └───────┬────────┘        │
//! │                   └────────────┘           │                 │
//! │                        │                   ▼                 │
//! │                   ┌────────────┐   ┌────────────────┐        │
//! │                   │ RESP codec │   │    Keyspace    │        │
//! │                   └────────────┘   │  (one mutex)   │        │
//! │                                    └───────▲────────┘        │
//! │                                            │                 │
//! │                                    ┌───────┴────────┐        │
//! │                                    │ active expirer │        │
//! │                                    │  (bg task)     │        │
//! │                                    └────────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bytes flow `socket -> decode -> dispatch -> keyspace -> encode ->
//! socket`. The only shared state is the keyspace, guarded by a single
//! mutex, so every command executes atomically and concurrent commands
//! serialize on the lock.
//!
//! ## Supported commands
//!
//! `PING`, `ECHO`, `SET` (with `EX`/`PX`/`EXAT`/`PXAT`), `GET`,
//! `EXISTS`, `DEL`, `INCR`, `DECR`, `LPUSH`, `LPOP`.
//!
//! ## Expiration
//!
//! Keys expire two ways. Lazily: any command that reads an expired
//! record deletes it and answers as if the key never existed. Actively:
//! a background task samples expiring records and deletes the dead ones,
//! sweeping harder when it finds a lot of garbage.
//!
//! ## Quick start
//!
//! ```ignore
//! use emberkv::commands::CommandHandler;
//! use emberkv::connection::{handle_connection, ConnectionStats};
//! use emberkv::storage::{start_expirer, Keyspace};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(Keyspace::new());
//!     let _expirer = start_expirer(Arc::clone(&store));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("0.0.0.0:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let commands = CommandHandler::new(Arc::clone(&store));
//!         tokio::spawn(handle_connection(stream, addr, commands, Arc::clone(&stats)));
//!     }
//! }
//! ```

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{decode, FrameError, RespValue};
pub use storage::{start_expirer, ExpirerHandle, Keyspace};

/// The default port emberkv listens on, same as Redis.
pub const DEFAULT_PORT: u16 = 6379;

/// The default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// The default log file, written alongside stdout.
pub const DEFAULT_LOG_FILE: &str = "emberkv.log";

/// Crate version, from Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
