//! The keyspace and its expiration machinery.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Keyspace                    │
//! │        Mutex<HashMap<Bytes, Record>>         │
//! │                                              │
//! │   Record = Value (Str | List) + expires_at   │
//! └──────────────────────────────────────────────┘
//!        ▲                          ▲
//!        │ per-command ops          │ sweep_sample
//!        │ (lazy expiration)        │ (active expiration)
//!   connection tasks           expirer task
//! ```
//!
//! Expired records are reclaimed two ways: lazily, by whichever command
//! reads them next, and actively, by the background sweeper in
//! [`expiry`].

pub mod expiry;
pub mod keyspace;

pub use expiry::{start_expirer, ExpirerHandle, ACTIVE_EXPIRE_SAMPLE, SWEEP_INTERVAL};
pub use keyspace::{now_ms, Keyspace, Record, StoreError, Value};
