//! The shared keyspace.
//!
//! One map from key to record, guarded by one `std::sync::Mutex`. Every
//! public method locks, does all of its reading and writing, and unlocks
//! before returning; nothing borrowed from the map survives past the
//! guard, and the guard never crosses an `.await`. That is the whole
//! concurrency story: each command observes and mutates the keyspace
//! atomically, and concurrent commands serialize on the lock.
//!
//! A `std::sync::Mutex` (not tokio's) is the right primitive here: the
//! critical sections are a handful of map operations, and the guard is
//! never held across a suspension point.
//!
//! ## Records and expiration
//!
//! A record pairs a value (string or list) with an optional absolute
//! expiration in milliseconds since the Unix epoch. An expired record is
//! logically absent: any operation that touches such a record deletes it
//! first and then proceeds as if the key never existed. The background
//! sweeper in [`crate::storage::expiry`] removes expired records that
//! nobody reads.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Failures surfaced to command handlers. The display text is the stable
/// wire-visible error string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key exists but holds the other value variant.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The stored string is not a decimal i64, or the arithmetic would
    /// leave the signed 64-bit range.
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
}

/// A stored value: exactly one of the two variants at a time. Changing
/// variant requires deleting the key first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An arbitrary byte string.
    Str(Bytes),

    /// An ordered sequence with O(1) push and pop at the head. The deque
    /// also tracks the tail so tail operations stay O(1) if they are ever
    /// exposed.
    List(VecDeque<Bytes>),
}

/// A keyspace entry: the value plus an optional absolute expiration.
#[derive(Debug, Clone)]
pub struct Record {
    pub value: Value,
    /// `None` means the record never expires.
    pub expires_at: Option<u64>,
}

impl Record {
    fn str(value: Bytes, expires_at: Option<u64>) -> Self {
        Self {
            value: Value::Str(value),
            expires_at,
        }
    }

    fn empty_list() -> Self {
        Self {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        }
    }

    #[inline]
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(when) if when <= now)
    }
}

/// The shared keyspace. Wrap it in an `Arc` and hand clones of the `Arc`
/// to every connection task and to the expirer.
#[derive(Debug, Default)]
pub struct Keyspace {
    records: Mutex<HashMap<Bytes, Record>>,
}

/// Deletes `key` if its record has expired. Reads that find an expired
/// record must remove it before answering "missing".
fn evict_if_expired(records: &mut HashMap<Bytes, Record>, key: &Bytes, now: u64) {
    let expired = records.get(key).map_or(false, |rec| rec.is_expired(now));
    if expired {
        records.remove(key);
    }
}

fn parse_i64(raw: &Bytes) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse::<i64>().ok()
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally writes a string record, replacing any prior record
    /// and its expiration.
    pub fn set(&self, key: Bytes, value: Bytes, expires_at: Option<u64>) {
        let mut records = self.records.lock().unwrap();
        records.insert(key, Record::str(value, expires_at));
    }

    /// Reads a string value. Missing and expired keys answer `None`;
    /// expired records are deleted on the way out.
    pub fn get(&self, key: &Bytes) -> Result<Option<Bytes>, StoreError> {
        let mut records = self.records.lock().unwrap();
        evict_if_expired(&mut records, key, now_ms());
        match records.get(key) {
            None => Ok(None),
            Some(rec) => match &rec.value {
                Value::Str(s) => Ok(Some(s.clone())),
                Value::List(_) => Err(StoreError::WrongType),
            },
        }
    }

    /// Counts how many of `keys` are present and unexpired. Duplicates
    /// count once per occurrence.
    pub fn exists(&self, keys: &[Bytes]) -> u64 {
        let mut records = self.records.lock().unwrap();
        let now = now_ms();
        let mut found = 0;
        for key in keys {
            evict_if_expired(&mut records, key, now);
            if records.contains_key(key) {
                found += 1;
            }
        }
        found
    }

    /// Removes `keys`, returning how many live records were deleted.
    /// Records that had already expired are purged but not counted.
    pub fn del(&self, keys: &[Bytes]) -> u64 {
        let mut records = self.records.lock().unwrap();
        let now = now_ms();
        let mut removed = 0;
        for key in keys {
            evict_if_expired(&mut records, key, now);
            if records.remove(key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Adds `delta` to the integer stored at `key` and answers the new
    /// value. A missing key is created as "0" with no expiration before
    /// the arithmetic; an existing record keeps its expiration. Overflow
    /// and non-integer strings fail without mutating.
    pub fn incr_by(&self, key: &Bytes, delta: i64) -> Result<i64, StoreError> {
        let mut records = self.records.lock().unwrap();
        evict_if_expired(&mut records, key, now_ms());
        let rec = records
            .entry(key.clone())
            .or_insert_with(|| Record::str(Bytes::from_static(b"0"), None));
        let current = match &rec.value {
            Value::Str(s) => parse_i64(s).ok_or(StoreError::NotAnInteger)?,
            Value::List(_) => return Err(StoreError::WrongType),
        };
        let next = current.checked_add(delta).ok_or(StoreError::NotAnInteger)?;
        rec.value = Value::Str(Bytes::from(next.to_string()));
        Ok(next)
    }

    /// Pushes `values` at the head of the list, in argument order, so the
    /// last value pushed ends up first. A missing key is created as an
    /// empty list with no expiration; an existing list keeps its
    /// expiration. Answers the resulting length.
    pub fn lpush(&self, key: &Bytes, values: &[Bytes]) -> Result<usize, StoreError> {
        let mut records = self.records.lock().unwrap();
        evict_if_expired(&mut records, key, now_ms());
        let rec = records.entry(key.clone()).or_insert_with(Record::empty_list);
        match &mut rec.value {
            Value::List(list) => {
                for value in values {
                    list.push_front(value.clone());
                }
                Ok(list.len())
            }
            Value::Str(_) => Err(StoreError::WrongType),
        }
    }

    /// Pops one element from the head. `None` means the key is missing,
    /// expired, or holds an empty list.
    pub fn lpop_one(&self, key: &Bytes) -> Result<Option<Bytes>, StoreError> {
        let mut records = self.records.lock().unwrap();
        evict_if_expired(&mut records, key, now_ms());
        match records.get_mut(key) {
            None => Ok(None),
            Some(rec) => match &mut rec.value {
                Value::List(list) => Ok(list.pop_front()),
                Value::Str(_) => Err(StoreError::WrongType),
            },
        }
    }

    /// Pops up to `count` elements from the head, first popped first.
    /// `None` means the key is missing, expired, or holds an empty list;
    /// `Some(vec)` is the popped prefix, empty when `count` is zero.
    /// A drained list stays in the map as an empty record.
    pub fn lpop_many(&self, key: &Bytes, count: usize) -> Result<Option<Vec<Bytes>>, StoreError> {
        let mut records = self.records.lock().unwrap();
        evict_if_expired(&mut records, key, now_ms());
        match records.get_mut(key) {
            None => Ok(None),
            Some(rec) => match &mut rec.value {
                Value::List(list) => {
                    if list.is_empty() {
                        return Ok(None);
                    }
                    let take = count.min(list.len());
                    Ok(Some(list.drain(..take).collect()))
                }
                Value::Str(_) => Err(StoreError::WrongType),
            },
        }
    }

    /// Number of records currently in the map, expired or not.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One active-expiration cycle: samples up to `limit` records that
    /// carry an expiration (iteration order is arbitrary) and deletes the
    /// ones already expired. Answers `(expired, sampled)` so the caller
    /// can decide whether to sweep again immediately.
    pub fn sweep_sample(&self, limit: usize) -> (usize, usize) {
        let mut records = self.records.lock().unwrap();
        let now = now_ms();
        let mut sampled = 0;
        let mut doomed = Vec::new();
        for (key, rec) in records.iter() {
            if rec.expires_at.is_none() {
                continue;
            }
            sampled += 1;
            if rec.is_expired(now) {
                doomed.push(key.clone());
            }
            if sampled >= limit {
                break;
            }
        }
        for key in &doomed {
            records.remove(key);
        }
        (doomed.len(), sampled)
    }
}
