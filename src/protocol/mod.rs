//! RESP wire protocol: value model, encoder, and incremental decoder.
//!
//! Requests and responses share one value type, [`RespValue`]. The
//! decoder ([`parser::decode`]) turns buffered bytes into values and
//! reports how many bytes each frame occupied, which is what makes
//! pipelining work: the connection task peels complete frames off the
//! front of its buffer and leaves the rest for the next round.
//!
//! ```ignore
//! use emberkv::protocol::{decode, RespValue};
//!
//! let wire = b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n";
//! let (request, consumed) = decode(wire)?.expect("complete frame");
//! assert_eq!(consumed, wire.len());
//!
//! let reply = RespValue::bulk("hi").serialize()?;
//! ```

pub mod parser;
pub mod types;

pub use parser::{decode, FrameError, MAX_BULK_LEN};
pub use types::{EncodeError, RespValue};
