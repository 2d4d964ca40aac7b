//! Incremental RESP decoder.
//!
//! The decoder works over whatever bytes have been buffered so far and
//! reports one of three outcomes:
//!
//! - `Ok(Some((value, consumed)))` - a complete frame was decoded and
//!   occupied `consumed` bytes at the front of the buffer
//! - `Ok(None)` - the buffer holds a prefix of a valid frame; the caller
//!   should read more bytes and retry
//! - `Err(FrameError)` - the bytes can never form a valid frame
//!
//! Framing is done by parsing alone. The decoder never scans for a
//! trailing CRLF to guess where a request ends, so bulk payloads that
//! themselves contain CRLF frame correctly.
//!
//! Simple strings and simple errors decode to [`RespValue::Bulk`]: the
//! server only ever receives arrays of bulk strings, so downstream
//! consumers see one byte-string shape regardless of which line-oriented
//! tag the client used.

use crate::protocol::types::{tag, RespValue};
use bytes::Bytes;
use thiserror::Error;

/// Hard cap on a single bulk string payload, 512 MB.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth; deeper frames are rejected rather than
/// recursed into.
pub const MAX_FRAME_DEPTH: usize = 32;

/// A framing failure. The bytes seen so far can never become a valid
/// frame, so the connection should not try to resynchronize.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The first byte is not one of the five RESP type tags.
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// A length or integer field did not parse as signed decimal.
    #[error("invalid decimal in frame header")]
    BadDecimal,

    /// Bulk string length was negative and not the null sentinel `-1`.
    #[error("invalid bulk string length {0}")]
    BadBulkLength(i64),

    /// Array count was negative and not the null sentinel `-1`.
    #[error("invalid array length {0}")]
    BadArrayLength(i64),

    /// Bulk string payload exceeds [`MAX_BULK_LEN`].
    #[error("bulk string of {size} bytes exceeds the {max} byte limit")]
    BulkTooLarge { size: usize, max: usize },

    /// Bulk string payload was not terminated by CRLF.
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// Arrays nested deeper than [`MAX_FRAME_DEPTH`].
    #[error("frame nesting deeper than {0}")]
    TooDeep(usize),
}

/// Attempts to decode one frame from the front of `buf`.
pub fn decode(buf: &[u8]) -> Result<Option<(RespValue, usize)>, FrameError> {
    decode_value(buf, 0)
}

fn decode_value(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>, FrameError> {
    if depth > MAX_FRAME_DEPTH {
        return Err(FrameError::TooDeep(MAX_FRAME_DEPTH));
    }
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    match first {
        // Line-oriented payloads collapse to byte-strings, see module docs.
        tag::SIMPLE_STRING | tag::ERROR => decode_line(buf),
        tag::INTEGER => decode_integer(buf),
        tag::BULK_STRING => decode_bulk(buf),
        tag::ARRAY => decode_array(buf, depth),
        other => Err(FrameError::UnknownTag(other)),
    }
}

/// `+<text>\r\n` or `-<text>\r\n`.
fn decode_line(buf: &[u8]) -> Result<Option<(RespValue, usize)>, FrameError> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let payload = Bytes::copy_from_slice(&buf[1..1 + pos]);
            Ok(Some((RespValue::Bulk(payload), 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

/// `:<decimal>\r\n`.
fn decode_integer(buf: &[u8]) -> Result<Option<(RespValue, usize)>, FrameError> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let n = parse_decimal(&buf[1..1 + pos])?;
            Ok(Some((RespValue::Integer(n), 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

/// `$<len>\r\n<data>\r\n`, with `$-1\r\n` as the null bulk string.
fn decode_bulk(buf: &[u8]) -> Result<Option<(RespValue, usize)>, FrameError> {
    let header_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let len = parse_decimal(&buf[1..1 + header_end])?;

    if len == -1 {
        return Ok(Some((RespValue::Null, 1 + header_end + 2)));
    }
    if len < 0 {
        return Err(FrameError::BadBulkLength(len));
    }
    let len = len as usize;
    if len > MAX_BULK_LEN {
        return Err(FrameError::BulkTooLarge {
            size: len,
            max: MAX_BULK_LEN,
        });
    }

    let data_start = 1 + header_end + 2;
    let total = data_start + len + 2;
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[data_start + len..total] != b"\r\n" {
        return Err(FrameError::MissingCrlf);
    }

    let payload = Bytes::copy_from_slice(&buf[data_start..data_start + len]);
    Ok(Some((RespValue::Bulk(payload), total)))
}

/// `*<count>\r\n<elements...>`, with `*-1\r\n` as the null array.
fn decode_array(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>, FrameError> {
    let header_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let count = parse_decimal(&buf[1..1 + header_end])?;

    if count == -1 {
        return Ok(Some((RespValue::NullArray, 1 + header_end + 2)));
    }
    if count < 0 {
        return Err(FrameError::BadArrayLength(count));
    }

    let mut consumed = 1 + header_end + 2;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match decode_value(&buf[consumed..], depth + 1)? {
            Some((item, used)) => {
                items.push(item);
                consumed += used;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((RespValue::Array(items), consumed)))
}

/// Position of the first CRLF pair, if any.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}

/// Strict signed decimal: optional leading sign, no empty input, no
/// trailing garbage.
fn parse_decimal(digits: &[u8]) -> Result<i64, FrameError> {
    let s = std::str::from_utf8(digits).map_err(|_| FrameError::BadDecimal)?;
    s.parse::<i64>().map_err(|_| FrameError::BadDecimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(input: &[u8]) -> (RespValue, usize) {
        decode(input).unwrap().expect("frame should be complete")
    }

    #[test]
    fn decodes_simple_string_as_byte_string() {
        let (value, consumed) = complete(b"+OK\r\n");
        assert_eq!(value, RespValue::Bulk(Bytes::from("OK")));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn decodes_simple_error_as_byte_string() {
        let (value, consumed) = complete(b"-ERR unknown command\r\n");
        assert_eq!(value, RespValue::Bulk(Bytes::from("ERR unknown command")));
        assert_eq!(consumed, 22);
    }

    #[test]
    fn decodes_integers() {
        assert_eq!(complete(b":1000\r\n"), (RespValue::Integer(1000), 7));
        assert_eq!(complete(b":-42\r\n"), (RespValue::Integer(-42), 6));
        assert_eq!(complete(b":+7\r\n"), (RespValue::Integer(7), 5));
        assert_eq!(
            complete(b":9223372036854775807\r\n"),
            (RespValue::Integer(i64::MAX), 22)
        );
    }

    #[test]
    fn decodes_bulk_string() {
        let (value, consumed) = complete(b"$5\r\nhello\r\n");
        assert_eq!(value, RespValue::Bulk(Bytes::from("hello")));
        assert_eq!(consumed, 11);
    }

    #[test]
    fn decodes_empty_bulk_string() {
        let (value, consumed) = complete(b"$0\r\n\r\n");
        assert_eq!(value, RespValue::Bulk(Bytes::new()));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn bulk_payload_may_contain_crlf() {
        let (value, consumed) = complete(b"$8\r\nab\r\ncd\r\n\r\n");
        assert_eq!(value, RespValue::Bulk(Bytes::from_static(b"ab\r\ncd\r\n")));
        assert_eq!(consumed, 14);
    }

    #[test]
    fn decodes_null_bulk_and_null_array() {
        let (value, consumed) = complete(b"$-1\r\n");
        assert!(value.is_null());
        assert_eq!(consumed, 5);

        let (value, consumed) = complete(b"*-1\r\n");
        assert!(value.is_null());
        assert_eq!(consumed, 5);
    }

    #[test]
    fn decodes_command_array() {
        let (value, consumed) = complete(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::Bulk(Bytes::from("GET")),
                RespValue::Bulk(Bytes::from("foo")),
            ])
        );
        assert_eq!(consumed, 22);
    }

    #[test]
    fn decodes_empty_array() {
        let (value, consumed) = complete(b"*0\r\n");
        assert_eq!(value, RespValue::Array(vec![]));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn decodes_nested_array() {
        let (value, _) = complete(b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n");
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::Integer(1),
                RespValue::Array(vec![RespValue::Integer(2), RespValue::Integer(3)]),
            ])
        );
    }

    #[test]
    fn incomplete_frames_ask_for_more() {
        assert_eq!(decode(b""), Ok(None));
        assert_eq!(decode(b"+OK"), Ok(None));
        assert_eq!(decode(b"+OK\r"), Ok(None));
        assert_eq!(decode(b":12"), Ok(None));
        assert_eq!(decode(b"$5\r\nhel"), Ok(None));
        assert_eq!(decode(b"$5\r\nhello\r"), Ok(None));
        assert_eq!(decode(b"*2\r\n$3\r\nGET\r\n"), Ok(None));
    }

    #[test]
    fn unknown_tag_is_a_frame_error() {
        assert_eq!(decode(b"@nope\r\n"), Err(FrameError::UnknownTag(b'@')));
    }

    #[test]
    fn bad_decimal_is_a_frame_error() {
        assert_eq!(decode(b":abc\r\n"), Err(FrameError::BadDecimal));
        assert_eq!(decode(b"$x\r\n"), Err(FrameError::BadDecimal));
        assert_eq!(decode(b"*1.5\r\n"), Err(FrameError::BadDecimal));
    }

    #[test]
    fn negative_lengths_other_than_null_are_rejected() {
        assert_eq!(decode(b"$-2\r\n"), Err(FrameError::BadBulkLength(-2)));
        assert_eq!(decode(b"*-2\r\n"), Err(FrameError::BadArrayLength(-2)));
    }

    #[test]
    fn oversized_bulk_is_rejected() {
        let result = decode(b"$536870913\r\n");
        assert_eq!(
            result,
            Err(FrameError::BulkTooLarge {
                size: MAX_BULK_LEN + 1,
                max: MAX_BULK_LEN,
            })
        );
    }

    #[test]
    fn bulk_without_trailing_crlf_is_rejected() {
        assert_eq!(decode(b"$3\r\nabcXY"), Err(FrameError::MissingCrlf));
    }

    #[test]
    fn consumed_stops_at_frame_boundary() {
        // Two pipelined requests: decoding must consume exactly the first.
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, consumed) = complete(input);
        assert_eq!(consumed, 14);
        let (_, consumed) = complete(&input[consumed..]);
        assert_eq!(consumed, 14);
    }

    #[test]
    fn roundtrips_through_serialize() {
        let original = RespValue::string_array([
            Bytes::from("SET"),
            Bytes::from("key"),
            Bytes::from("value with\r\ninner crlf"),
        ]);
        let wire = original.serialize().unwrap();
        let (decoded, consumed) = complete(&wire);
        assert_eq!(decoded, original);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn roundtrips_integers_through_serialize() {
        for n in [0, 1, -1, 42, i64::MAX, i64::MIN] {
            let wire = RespValue::integer(n).serialize().unwrap();
            let (decoded, consumed) = complete(&wire);
            assert_eq!(decoded, RespValue::Integer(n));
            assert_eq!(consumed, wire.len());
        }
    }

    #[test]
    fn roundtrips_simple_string_payload() {
        let wire = RespValue::simple("PONG").serialize().unwrap();
        let (decoded, consumed) = complete(&wire);
        // Line-oriented payloads come back as byte-strings.
        assert_eq!(decoded, RespValue::Bulk(Bytes::from("PONG")));
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let mut input = Vec::new();
        for _ in 0..(MAX_FRAME_DEPTH + 2) {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");
        assert_eq!(decode(&input), Err(FrameError::TooDeep(MAX_FRAME_DEPTH)));
    }
}
