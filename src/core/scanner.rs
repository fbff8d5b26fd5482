//! SIMD-accelerated cursor over decoded document text
//!
//! Uses memchr crate for fast delimiter search:
//! - SSE2 (default x86_64)
//! - AVX2 (runtime detection)
//! - NEON (aarch64)
//!
//! All delimiters searched for are ASCII, so every position the cursor
//! stops at is a char boundary of the underlying `&str`.

use memchr::{memchr, memchr2, memmem};

/// Cursor for XML delimiter detection
pub struct Cursor<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the start of `input`
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Cursor {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    #[inline]
    pub fn input(&self) -> &'a str {
        self.input
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.bytes.len());
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Remaining text from the current position
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Text between two byte positions
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bytes.len());
    }

    /// Skip XML whitespace, returning true if any was skipped
    #[inline]
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
        self.pos > start
    }

    /// Check if input continues with `needle` at the current position
    #[inline]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.bytes[self.pos..].starts_with(needle.as_bytes())
    }

    /// Consume `needle` if present
    #[inline]
    pub fn eat(&mut self, needle: &str) -> bool {
        if self.starts_with(needle) {
            self.pos += needle.len();
            true
        } else {
            false
        }
    }

    /// Consume a single byte if present
    #[inline]
    pub fn eat_byte(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Find next occurrence of a specific byte
    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.bytes[self.pos..]).map(|i| self.pos + i)
    }

    /// Find next occurrence of either of two bytes
    #[inline]
    pub fn find_byte2(&self, b1: u8, b2: u8) -> Option<usize> {
        memchr2(b1, b2, &self.bytes[self.pos..]).map(|i| self.pos + i)
    }

    /// Find next occurrence of a multi-byte delimiter
    #[inline]
    pub fn find_str(&self, needle: &str) -> Option<usize> {
        memmem::find(&self.bytes[self.pos..], needle.as_bytes()).map(|i| self.pos + i)
    }

    /// Read up to `delimiter`, advancing past it.
    ///
    /// Returns `None` and leaves the cursor untouched if the delimiter never
    /// occurs.
    pub fn read_until(&mut self, delimiter: &str) -> Option<&'a str> {
        let end = self.find_str(delimiter)?;
        let text = &self.input[self.pos..end];
        self.pos = end + delimiter.len();
        Some(text)
    }

    /// Read an XML name (starts with a name start char, continues with name chars)
    pub fn read_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.bytes.get(start) {
            Some(&b) if is_name_start_byte(b) => {}
            _ => return None,
        }
        self.pos += 1;
        while self.pos < self.bytes.len() && is_name_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
        Some(&self.input[start..self.pos])
    }

    /// Read a quoted literal (`"..."` or `'...'`), returning its content
    pub fn read_quoted(&mut self) -> Option<&'a str> {
        let quote = self.peek()?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let start = self.pos + 1;
        let end = memchr(quote, &self.bytes[start..])? + start;
        self.pos = end + 1;
        Some(&self.input[start..end])
    }
}

/// Check if byte can start an XML name
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_start_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte can continue an XML name
#[inline]
pub fn is_name_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

/// True if `s` is a well-formed XML Name
pub fn is_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(&b) if is_name_start_byte(b) => bytes[1..].iter().all(|&b| is_name_byte(b)),
        _ => false,
    }
}

/// True if `s` is a well-formed Nmtoken
pub fn is_nmtoken(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_name_byte)
}

/// True if `s` is all XML whitespace
#[inline]
pub fn is_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}
