//! The command layer: request in, reply out.
//!
//! ```text
//! decoded request (array of bulk strings)
//!        │
//!        ▼
//! ┌────────────────┐      ┌──────────────┐
//! │ CommandHandler │─────>│   Keyspace   │
//! │ validate, run  │      │ (one mutex)  │
//! └────────────────┘      └──────────────┘
//!        │
//!        ▼
//!   RESP reply
//! ```
//!
//! Handlers never touch the socket; the connection task owns all I/O.
//! They also never hold keyspace state between calls, so every command
//! is atomic with respect to every other.

pub mod handler;

pub use handler::CommandHandler;
