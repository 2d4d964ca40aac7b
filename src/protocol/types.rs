//! RESP (Redis Serialization Protocol) values and their wire encoding.
//!
//! Every RESP frame starts with a one-byte type tag and is terminated by
//! CRLF (`\r\n`):
//!
//! - `+` simple string, e.g. `+OK\r\n`
//! - `-` simple error, e.g. `-ERR unknown command\r\n`
//! - `:` integer, e.g. `:1000\r\n`
//! - `$` bulk string, e.g. `$5\r\nhello\r\n` (null: `$-1\r\n`)
//! - `*` array, e.g. `*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n` (null: `*-1\r\n`)
//!
//! Bulk strings are binary safe and length prefixed; simple strings and
//! errors are line oriented and therefore must never contain CR or LF.
//! Serialization enforces that restriction and fails with [`EncodeError`]
//! instead of emitting a frame the peer could not re-frame.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// The CRLF frame terminator.
pub const CRLF: &[u8] = b"\r\n";

/// RESP type tags.
pub mod tag {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Returned when a simple string or error payload contains CR or LF.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("simple strings and errors cannot contain CR or LF")]
pub struct EncodeError;

/// A single RESP value, used both for decoded requests and for building
/// responses.
///
/// The two null spellings are kept apart: a null bulk string (`$-1\r\n`)
/// and a null array (`*-1\r\n`) are distinct frames on the wire even
/// though both mean "nothing here".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Line-oriented string without CR or LF. `+<text>\r\n`
    Simple(String),

    /// Line-oriented error without CR or LF. `-<text>\r\n`
    Error(String),

    /// Signed 64-bit integer. `:<decimal>\r\n`
    Integer(i64),

    /// Binary-safe, length-prefixed string. `$<len>\r\n<data>\r\n`
    Bulk(Bytes),

    /// Null bulk string. `$-1\r\n`
    Null,

    /// Null array. `*-1\r\n`
    NullArray,

    /// Sequence of nested values. `*<count>\r\n<elements...>`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Builds a simple string response.
    pub fn simple(s: impl Into<String>) -> Self {
        RespValue::Simple(s.into())
    }

    /// Builds an error response.
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Builds an integer response.
    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Builds a bulk string response.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::Bulk(data.into())
    }

    /// Builds an array of bulk strings out of a sequence of byte strings.
    pub fn string_array(items: impl IntoIterator<Item = Bytes>) -> Self {
        RespValue::Array(items.into_iter().map(RespValue::Bulk).collect())
    }

    /// The canonical `+OK\r\n` reply.
    pub fn ok() -> Self {
        RespValue::Simple("OK".to_string())
    }

    /// The canonical `+PONG\r\n` reply.
    pub fn pong() -> Self {
        RespValue::Simple("PONG".to_string())
    }

    /// Returns true for either null spelling.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null | RespValue::NullArray)
    }

    /// Returns true if this value is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Borrows the payload of a bulk string.
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            RespValue::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Serializes this value to its wire form.
    pub fn serialize(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }

    /// Serializes this value into an existing buffer.
    ///
    /// On failure the buffer may hold a partially written frame and must
    /// be discarded by the caller.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            RespValue::Simple(s) => write_line(buf, tag::SIMPLE_STRING, s),
            RespValue::Error(s) => write_line(buf, tag::ERROR, s),
            RespValue::Integer(n) => {
                buf.push(tag::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                Ok(())
            }
            RespValue::Bulk(data) => {
                buf.push(tag::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
                Ok(())
            }
            RespValue::Null => {
                buf.extend_from_slice(b"$-1\r\n");
                Ok(())
            }
            RespValue::NullArray => {
                buf.extend_from_slice(b"*-1\r\n");
                Ok(())
            }
            RespValue::Array(items) => {
                buf.push(tag::ARRAY);
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for item in items {
                    item.serialize_into(buf)?;
                }
                Ok(())
            }
        }
    }
}

/// Writes a line-oriented frame, rejecting payloads that would break
/// framing for the peer.
fn write_line(buf: &mut Vec<u8>, tag: u8, text: &str) -> Result<(), EncodeError> {
    if text.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(EncodeError);
    }
    buf.push(tag);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(CRLF);
    Ok(())
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::Simple(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            RespValue::Null | RespValue::NullArray => write!(f, "(nil)"),
            RespValue::Array(items) => {
                if items.is_empty() {
                    return write!(f, "(empty array)");
                }
                writeln!(f)?;
                for (i, item) in items.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, item)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_string_wire_form() {
        assert_eq!(RespValue::ok().serialize().unwrap(), b"+OK\r\n");
        assert_eq!(RespValue::pong().serialize().unwrap(), b"+PONG\r\n");
    }

    #[test]
    fn error_wire_form() {
        let value = RespValue::error("ERR unknown command 'foo'");
        assert_eq!(
            value.serialize().unwrap(),
            b"-ERR unknown command 'foo'\r\n"
        );
    }

    #[test]
    fn integer_wire_form() {
        assert_eq!(RespValue::integer(1000).serialize().unwrap(), b":1000\r\n");
        assert_eq!(RespValue::integer(-42).serialize().unwrap(), b":-42\r\n");
        assert_eq!(RespValue::integer(0).serialize().unwrap(), b":0\r\n");
        assert_eq!(
            RespValue::integer(i64::MIN).serialize().unwrap(),
            b":-9223372036854775808\r\n"
        );
    }

    #[test]
    fn bulk_string_wire_form() {
        let value = RespValue::bulk(Bytes::from("hello"));
        assert_eq!(value.serialize().unwrap(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn empty_bulk_string_keeps_explicit_length() {
        let value = RespValue::bulk(Bytes::new());
        assert_eq!(value.serialize().unwrap(), b"$0\r\n\r\n");
    }

    #[test]
    fn bulk_string_is_binary_safe() {
        let value = RespValue::bulk(Bytes::from_static(b"a\r\nb\x00c"));
        assert_eq!(value.serialize().unwrap(), b"$6\r\na\r\nb\x00c\r\n");
    }

    #[test]
    fn null_spellings() {
        assert_eq!(RespValue::Null.serialize().unwrap(), b"$-1\r\n");
        assert_eq!(RespValue::NullArray.serialize().unwrap(), b"*-1\r\n");
    }

    #[test]
    fn array_wire_form() {
        let value = RespValue::string_array([Bytes::from("GET"), Bytes::from("foo")]);
        assert_eq!(
            value.serialize().unwrap(),
            b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n"
        );
    }

    #[test]
    fn nested_array_wire_form() {
        let value = RespValue::Array(vec![
            RespValue::integer(1),
            RespValue::Array(vec![RespValue::integer(2), RespValue::integer(3)]),
        ]);
        assert_eq!(value.serialize().unwrap(), b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n");
    }

    #[test]
    fn simple_string_rejects_cr_and_lf() {
        assert_eq!(
            RespValue::simple("split\rhere").serialize(),
            Err(EncodeError)
        );
        assert_eq!(
            RespValue::simple("split\nhere").serialize(),
            Err(EncodeError)
        );
        assert_eq!(
            RespValue::error("bad\r\nerror").serialize(),
            Err(EncodeError)
        );
    }

    #[test]
    fn nested_encode_error_propagates() {
        let value = RespValue::Array(vec![RespValue::simple("ok"), RespValue::simple("no\r")]);
        assert!(value.serialize().is_err());
    }
}
