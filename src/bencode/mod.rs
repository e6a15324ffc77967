//! Canonical Encoding
//!
//! Deterministic keyed binary serialization shared by every routing
//! control message. The format is bencode restricted to its canonical
//! form:
//!
//! ```text
//! integer     i<decimal>e          no leading zeros, no "-0"
//! byte string <len>:<bytes>        len without leading zeros
//! list        l<value>*e
//! dictionary  d(<string><value>)*e keys ascending by raw bytes
//! ```
//!
//! Encoding never fails for values built through the typed API. Decoding
//! is streaming and key-driven (see [`Reader`]): the caller reads one key
//! at a time and decides what type of value to take next, skipping keys
//! it does not recognize.

mod reader;

pub use reader::{DecodeError, Reader};

use std::collections::BTreeMap;
use std::fmt;

/// Maximum nesting depth of lists and dictionaries accepted by the decoder.
pub const MAX_DEPTH: usize = 32;

/// Wire type of a canonical value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Bytes,
    List,
    Dict,
}

impl ValueKind {
    /// Classify the leading byte of an encoded value.
    pub fn from_lead_byte(b: u8) -> Option<Self> {
        match b {
            b'i' => Some(ValueKind::Integer),
            b'l' => Some(ValueKind::List),
            b'd' => Some(ValueKind::Dict),
            b'0'..=b'9' => Some(ValueKind::Bytes),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Bytes => "byte string",
            ValueKind::List => "list",
            ValueKind::Dict => "dictionary",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Value Tree
// ============================================================================

/// A fully materialized canonical value.
///
/// Integers are held as `i128` so that the whole `i64` and `u64` ranges
/// share one representation. Dictionaries are ordered by raw key bytes,
/// which makes [`Value::encode`] deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i128),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    /// Wire type of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::List(_) => ValueKind::List,
            Value::Dict(_) => ValueKind::Dict,
        }
    }

    /// Encode to canonical bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.write_value(self);
        enc.into_bytes()
    }

    /// Decode exactly one value spanning the whole buffer.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(buf);
        let value = reader.take_value()?;
        reader.finish()?;
        Ok(value)
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Look up a dictionary entry by key.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        match self {
            Value::Dict(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(n as i128)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n as i128)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

// ============================================================================
// Streaming Encoder
// ============================================================================

#[derive(Debug)]
enum Frame {
    List,
    Dict { last_key: Option<Vec<u8>> },
}

/// Streaming canonical encoder.
///
/// Dictionary keys must be written in ascending byte order; this is
/// asserted in debug builds since an out-of-order key is a programming
/// error in the caller, not a runtime condition.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    stack: Vec<Frame>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            stack: Vec::new(),
        }
    }

    pub fn begin_dict(&mut self) {
        self.buf.push(b'd');
        self.stack.push(Frame::Dict { last_key: None });
    }

    pub fn begin_list(&mut self) {
        self.buf.push(b'l');
        self.stack.push(Frame::List);
    }

    /// Close the innermost open list or dictionary.
    pub fn end(&mut self) {
        let popped = self.stack.pop();
        debug_assert!(popped.is_some(), "end() without open container");
        self.buf.push(b'e');
    }

    /// Write a dictionary key.
    pub fn write_key(&mut self, key: &[u8]) {
        if let Some(Frame::Dict { last_key }) = self.stack.last_mut() {
            debug_assert!(
                last_key.as_deref().map_or(true, |prev| prev < key),
                "dictionary keys out of order: {:?} after {:?}",
                String::from_utf8_lossy(key),
                last_key.as_deref().map(String::from_utf8_lossy),
            );
            *last_key = Some(key.to_vec());
        } else {
            debug_assert!(false, "write_key() outside a dictionary");
        }
        self.write_bytes(key);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes.len().to_string().as_bytes());
        self.buf.push(b':');
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u64(&mut self, n: u64) {
        self.write_integer(n as i128);
    }

    pub fn write_i64(&mut self, n: i64) {
        self.write_integer(n as i128);
    }

    fn write_integer(&mut self, n: i128) {
        self.buf.push(b'i');
        self.buf.extend_from_slice(n.to_string().as_bytes());
        self.buf.push(b'e');
    }

    /// Write a `key => integer` dictionary entry.
    pub fn dict_u64(&mut self, key: &[u8], n: u64) {
        self.write_key(key);
        self.write_u64(n);
    }

    /// Write a `key => byte string` dictionary entry.
    pub fn dict_bytes(&mut self, key: &[u8], bytes: &[u8]) {
        self.write_key(key);
        self.write_bytes(bytes);
    }

    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Integer(n) => self.write_integer(*n),
            Value::Bytes(b) => self.write_bytes(b),
            Value::List(items) => {
                self.begin_list();
                for item in items {
                    self.write_value(item);
                }
                self.end();
            }
            Value::Dict(map) => {
                self.begin_dict();
                for (key, item) in map {
                    self.write_key(key);
                    self.write_value(item);
                }
                self.end();
            }
        }
    }

    /// Finish encoding and return the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        debug_assert!(self.stack.is_empty(), "unterminated container");
        self.buf
    }
}

#[cfg(test)]
mod tests;
