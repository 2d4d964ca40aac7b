//! Command dispatch and handlers.
//!
//! A decoded request is an array of bulk strings; the first element,
//! lowercased, names the command. Each handler validates its argument
//! count before touching the keyspace, so an error reply never comes
//! with a partial mutation.
//!
//! Supported commands:
//!
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value [EX s | PX ms | EXAT s | PXAT ms]`
//! - `GET key`
//! - `EXISTS key [key ...]`
//! - `DEL key [key ...]`
//! - `INCR key` / `DECR key`
//! - `LPUSH key value [value ...]`
//! - `LPOP key [count]`
//!
//! Anything else answers `ERR unknown command '<name>'`.

use crate::protocol::RespValue;
use crate::storage::{now_ms, Keyspace};
use bytes::Bytes;
use std::sync::Arc;

/// Executes requests against the shared keyspace. Cheap to clone; every
/// connection task gets its own copy.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Keyspace>,
}

fn wrong_arity(command: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

fn parse_i64(raw: &Bytes) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse::<i64>().ok()
}

impl CommandHandler {
    pub fn new(store: Arc<Keyspace>) -> Self {
        Self { store }
    }

    /// Executes one decoded request and produces its reply.
    pub fn execute(&self, request: RespValue) -> RespValue {
        let items = match request {
            RespValue::Array(items) => items,
            _ => return RespValue::error("ERR protocol error: expected an array of bulk strings"),
        };
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespValue::Bulk(data) => parts.push(data),
                _ => {
                    return RespValue::error(
                        "ERR protocol error: expected an array of bulk strings",
                    )
                }
            }
        }
        let Some((name, args)) = parts.split_first() else {
            return RespValue::error("ERR empty command");
        };
        let name = String::from_utf8_lossy(name).to_lowercase();
        self.dispatch(&name, args)
    }

    fn dispatch(&self, name: &str, args: &[Bytes]) -> RespValue {
        match name {
            "ping" => self.cmd_ping(args),
            "echo" => self.cmd_echo(args),
            "set" => self.cmd_set(args),
            "get" => self.cmd_get(args),
            "exists" => self.cmd_exists(args),
            "del" => self.cmd_del(args),
            "incr" => self.cmd_incr(args),
            "decr" => self.cmd_decr(args),
            "lpush" => self.cmd_lpush(args),
            "lpop" => self.cmd_lpop(args),
            _ => RespValue::error(format!("ERR unknown command '{}'", name)),
        }
    }

    /// PING answers PONG, or echoes its single argument as a bulk string.
    fn cmd_ping(&self, args: &[Bytes]) -> RespValue {
        match args {
            [] => RespValue::pong(),
            [message] => RespValue::bulk(message.clone()),
            _ => wrong_arity("ping"),
        }
    }

    fn cmd_echo(&self, args: &[Bytes]) -> RespValue {
        match args {
            [message] => RespValue::bulk(message.clone()),
            _ => wrong_arity("echo"),
        }
    }

    /// SET key value [EX s | PX ms | EXAT s | PXAT ms]
    ///
    /// Writes unconditionally, replacing any prior record. The optional
    /// pair sets an absolute expiration in milliseconds since the epoch.
    fn cmd_set(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 && args.len() != 4 {
            return wrong_arity("set");
        }
        let expires_at = if args.len() == 4 {
            match parse_set_expiry(&args[2], &args[3]) {
                Ok(when) => Some(when),
                Err(reply) => return reply,
            }
        } else {
            None
        };
        self.store.set(args[0].clone(), args[1].clone(), expires_at);
        RespValue::ok()
    }

    fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        let [key] = args else {
            return wrong_arity("get");
        };
        match self.store.get(key) {
            Ok(Some(value)) => RespValue::bulk(value),
            Ok(None) => RespValue::Null,
            Err(e) => RespValue::error(e.to_string()),
        }
    }

    fn cmd_exists(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("exists");
        }
        RespValue::integer(self.store.exists(args) as i64)
    }

    fn cmd_del(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("del");
        }
        RespValue::integer(self.store.del(args) as i64)
    }

    fn cmd_incr(&self, args: &[Bytes]) -> RespValue {
        let [key] = args else {
            return wrong_arity("incr");
        };
        match self.store.incr_by(key, 1) {
            Ok(n) => RespValue::integer(n),
            Err(e) => RespValue::error(e.to_string()),
        }
    }

    fn cmd_decr(&self, args: &[Bytes]) -> RespValue {
        let [key] = args else {
            return wrong_arity("decr");
        };
        match self.store.incr_by(key, -1) {
            Ok(n) => RespValue::integer(n),
            Err(e) => RespValue::error(e.to_string()),
        }
    }

    fn cmd_lpush(&self, args: &[Bytes]) -> RespValue {
        let Some((key, values)) = args.split_first() else {
            return wrong_arity("lpush");
        };
        if values.is_empty() {
            return wrong_arity("lpush");
        }
        match self.store.lpush(key, values) {
            Ok(len) => RespValue::integer(len as i64),
            Err(e) => RespValue::error(e.to_string()),
        }
    }

    /// LPOP key answers one element as a bulk string; LPOP key count
    /// answers an array, even for a single element. A missing, expired,
    /// or empty list answers a null array either way.
    fn cmd_lpop(&self, args: &[Bytes]) -> RespValue {
        match args {
            [key] => match self.store.lpop_one(key) {
                Ok(Some(value)) => RespValue::bulk(value),
                Ok(None) => RespValue::NullArray,
                Err(e) => RespValue::error(e.to_string()),
            },
            [key, count] => {
                let count = match parse_i64(count) {
                    Some(n) => n,
                    None => {
                        return RespValue::error("ERR value is not an integer or out of range")
                    }
                };
                if count < 0 {
                    return RespValue::error("ERR value is out of range, must be positive");
                }
                match self.store.lpop_many(key, count as usize) {
                    Ok(Some(values)) => RespValue::string_array(values),
                    Ok(None) => RespValue::NullArray,
                    Err(e) => RespValue::error(e.to_string()),
                }
            }
            _ => wrong_arity("lpop"),
        }
    }
}

/// Turns a SET option pair into an absolute expiration in milliseconds.
///
/// All four options require a strictly positive integer argument. Errors
/// name the option the client got wrong.
fn parse_set_expiry(option: &Bytes, arg: &Bytes) -> Result<u64, RespValue> {
    let name = String::from_utf8_lossy(option).to_uppercase();
    if !matches!(name.as_str(), "EX" | "PX" | "EXAT" | "PXAT") {
        return Err(RespValue::error("ERR unknown option for SET"));
    }
    let amount = match parse_i64(arg) {
        Some(n) => n,
        None => {
            return Err(RespValue::error(format!(
                "ERR value for '{}' is not an integer or out of range",
                name
            )))
        }
    };
    if amount <= 0 {
        return Err(RespValue::error(format!(
            "ERR value for '{}' must be a positive integer",
            name
        )));
    }
    let amount = amount as u64;
    let when = match name.as_str() {
        "EX" => amount
            .checked_mul(1000)
            .and_then(|ms| now_ms().checked_add(ms)),
        "PX" => now_ms().checked_add(amount),
        "EXAT" => amount.checked_mul(1000),
        // PXAT is already absolute milliseconds.
        _ => Some(amount),
    };
    when.ok_or_else(|| {
        RespValue::error(format!(
            "ERR value for '{}' is not an integer or out of range",
            name
        ))
    })
}
