//! Cursor-based streaming decoder.

use super::{Value, ValueKind, MAX_DEPTH};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors produced while walking an encoded buffer.
///
/// Every variant except `TypeMismatch` means the input is not well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {pos}")]
    UnexpectedEof { pos: usize },

    #[error("invalid token 0x{byte:02x} at offset {pos}")]
    InvalidToken { pos: usize, byte: u8 },

    #[error("invalid integer at offset {pos}")]
    InvalidInteger { pos: usize },

    #[error("invalid string length at offset {pos}")]
    InvalidLength { pos: usize },

    #[error("expected {expected}, found {found} at offset {pos}")]
    TypeMismatch {
        pos: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("nesting deeper than {max} at offset {pos}")]
    DepthExceeded { pos: usize, max: usize },

    #[error("duplicate dictionary key at offset {pos}")]
    DuplicateKey { pos: usize },

    #[error("{remaining} trailing bytes at offset {pos}")]
    TrailingData { pos: usize, remaining: usize },
}

impl DecodeError {
    /// True for structural errors, false for a well-formed value of the
    /// wrong type.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DecodeError::TypeMismatch { .. })
    }
}

/// Explicit cursor over an immutable byte slice.
///
/// Each `take_*` call consumes exactly one value from the front of the
/// remaining input. On error the cursor position is unspecified and the
/// reader should be discarded.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, depth: 0 }
    }

    /// Current offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail unless the whole buffer has been consumed.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingData {
                pos: self.pos,
                remaining: self.remaining(),
            })
        }
    }

    fn peek_byte(&self) -> Result<u8, DecodeError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof { pos: self.pos })
    }

    /// Wire type of the next value, without consuming it.
    pub fn peek_kind(&self) -> Result<ValueKind, DecodeError> {
        let byte = self.peek_byte()?;
        ValueKind::from_lead_byte(byte).ok_or(DecodeError::InvalidToken {
            pos: self.pos,
            byte,
        })
    }

    fn expect_kind(&self, expected: ValueKind) -> Result<(), DecodeError> {
        let found = self.peek_kind()?;
        if found != expected {
            return Err(DecodeError::TypeMismatch {
                pos: self.pos,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn descend(&mut self) -> Result<(), DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(DecodeError::DepthExceeded {
                pos: self.pos,
                max: MAX_DEPTH,
            });
        }
        self.depth += 1;
        self.pos += 1;
        Ok(())
    }

    /// Consume a dictionary opener. Follow with [`Reader::next_key`] until
    /// it returns `None`.
    pub fn enter_dict(&mut self) -> Result<(), DecodeError> {
        self.expect_kind(ValueKind::Dict)?;
        self.descend()
    }

    /// Consume a list opener. Follow with [`Reader::has_next_item`].
    pub fn enter_list(&mut self) -> Result<(), DecodeError> {
        self.expect_kind(ValueKind::List)?;
        self.descend()
    }

    /// Consume the container terminator if it is next.
    fn take_end(&mut self) -> Result<bool, DecodeError> {
        if self.peek_byte()? == b'e' {
            self.pos += 1;
            self.depth = self.depth.saturating_sub(1);
            return Ok(true);
        }
        Ok(false)
    }

    /// Read the next dictionary key, or `None` at the terminator.
    pub fn next_key(&mut self) -> Result<Option<&'a [u8]>, DecodeError> {
        if self.take_end()? {
            return Ok(None);
        }
        let byte = self.peek_byte()?;
        if !byte.is_ascii_digit() {
            return Err(DecodeError::InvalidToken { pos: self.pos, byte });
        }
        self.take_string().map(Some)
    }

    /// True if another list item follows; consumes the terminator otherwise.
    pub fn has_next_item(&mut self) -> Result<bool, DecodeError> {
        Ok(!self.take_end()?)
    }

    pub fn take_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        self.expect_kind(ValueKind::Bytes)?;
        self.take_string()
    }

    fn take_string(&mut self) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        let mut len: usize = 0;
        let mut digits = 0;
        loop {
            let byte = self.peek_byte()?;
            match byte {
                b':' => break,
                b'0'..=b'9' => {
                    // "0" is the only length allowed to start with zero
                    if digits == 1 && self.buf[start] == b'0' {
                        return Err(DecodeError::InvalidLength { pos: start });
                    }
                    len = len
                        .checked_mul(10)
                        .and_then(|l| l.checked_add((byte - b'0') as usize))
                        .ok_or(DecodeError::InvalidLength { pos: start })?;
                    digits += 1;
                    self.pos += 1;
                }
                _ => return Err(DecodeError::InvalidLength { pos: self.pos }),
            }
        }
        if digits == 0 {
            return Err(DecodeError::InvalidLength { pos: start });
        }
        self.pos += 1; // ':'

        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof { pos: self.buf.len() });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Consume an integer token and return its validated decimal text.
    fn take_integer_text(&mut self) -> Result<&'a str, DecodeError> {
        self.expect_kind(ValueKind::Integer)?;
        let start = self.pos;
        self.pos += 1; // 'i'
        let body_start = self.pos;
        loop {
            let byte = self.peek_byte()?;
            match byte {
                b'e' => break,
                b'0'..=b'9' => self.pos += 1,
                b'-' if self.pos == body_start => self.pos += 1,
                _ => return Err(DecodeError::InvalidInteger { pos: self.pos }),
            }
        }
        let body = &self.buf[body_start..self.pos];
        self.pos += 1; // 'e'

        let digits = body.strip_prefix(b"-").unwrap_or(body);
        let negative = digits.len() != body.len();
        let canonical = match digits {
            [] => false,
            [b'0'] => !negative,
            [b'0', ..] => false,
            _ => true,
        };
        if !canonical {
            return Err(DecodeError::InvalidInteger { pos: start });
        }
        // Only ASCII digits and '-' were accepted above.
        std::str::from_utf8(body).map_err(|_| DecodeError::InvalidInteger { pos: start })
    }

    pub fn take_u64(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        self.take_integer_text()?
            .parse()
            .map_err(|_| DecodeError::InvalidInteger { pos: start })
    }

    pub fn take_i64(&mut self) -> Result<i64, DecodeError> {
        let start = self.pos;
        self.take_integer_text()?
            .parse()
            .map_err(|_| DecodeError::InvalidInteger { pos: start })
    }

    /// Integer spanning the union of the `i64` and `u64` ranges.
    fn take_wide_integer(&mut self) -> Result<i128, DecodeError> {
        let start = self.pos;
        let n: i128 = self
            .take_integer_text()?
            .parse()
            .map_err(|_| DecodeError::InvalidInteger { pos: start })?;
        if n < i64::MIN as i128 || n > u64::MAX as i128 {
            return Err(DecodeError::InvalidInteger { pos: start });
        }
        Ok(n)
    }

    /// Consume and discard one value of any type, including nested ones.
    pub fn skip_value(&mut self) -> Result<(), DecodeError> {
        match self.peek_kind()? {
            ValueKind::Integer => {
                self.take_integer_text()?;
            }
            ValueKind::Bytes => {
                self.take_string()?;
            }
            ValueKind::List => {
                self.enter_list()?;
                while self.has_next_item()? {
                    self.skip_value()?;
                }
            }
            ValueKind::Dict => {
                self.enter_dict()?;
                while self.next_key()?.is_some() {
                    self.skip_value()?;
                }
            }
        }
        Ok(())
    }

    /// Consume one value of any type and materialize it.
    pub fn take_value(&mut self) -> Result<Value, DecodeError> {
        match self.peek_kind()? {
            ValueKind::Integer => Ok(Value::Integer(self.take_wide_integer()?)),
            ValueKind::Bytes => Ok(Value::Bytes(self.take_string()?.to_vec())),
            ValueKind::List => {
                self.enter_list()?;
                let mut items = Vec::new();
                while self.has_next_item()? {
                    items.push(self.take_value()?);
                }
                Ok(Value::List(items))
            }
            ValueKind::Dict => {
                self.enter_dict()?;
                let mut map = BTreeMap::new();
                loop {
                    let key_pos = self.pos;
                    let Some(key) = self.next_key()? else {
                        break;
                    };
                    let value = self.take_value()?;
                    if map.insert(key.to_vec(), value).is_some() {
                        return Err(DecodeError::DuplicateKey { pos: key_pos });
                    }
                }
                Ok(Value::Dict(map))
            }
        }
    }
}
