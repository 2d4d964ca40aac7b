//! Client connection handling.
//!
//! The accept loop in `main` hands each socket to
//! [`handle_connection`], which runs the read-dispatch-reply loop for
//! that client on its own task:
//!
//! ```text
//! TcpListener ── accept ──> tokio::spawn(handle_connection)
//!                                  │
//!                 ┌────────────────┼─────────────────┐
//!                 ▼                ▼                 ▼
//!           read bytes ──> decode frame ──> execute ──> write reply
//!                 ▲                                      │
//!                 └──────────────────────────────────────┘
//! ```
//!
//! The task exits when the peer closes the socket, on any transport
//! error, or after a framing error has been answered.

pub mod handler;

pub use handler::{handle_connection, Connection, ConnectionError, ConnectionStats};
