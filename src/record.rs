//! Fixed-width record codec.
//!
//! A record is one 32-byte slice of a collected stream, read as an unsigned
//! little-endian 256-bit integer:
//!
//! ```text
//! offset:  0        32       64       96
//!          [record0][record1][record2][tail < 32 bytes, dropped]
//! ```
//!
//! Only complete groups are decoded. Whatever is left after the last full
//! group is ignored without error.

use std::fmt;

use num_bigint::BigUint;

use crate::constants::RECORD_WIDTH;
use crate::error::{CollectorError, Result};

/// Maximum significant bits a record can hold.
const RECORD_BITS: u64 = (RECORD_WIDTH * 8) as u64;

/// One 32-byte little-endian unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record([u8; RECORD_WIDTH]);

impl Record {
    /// Wrap raw little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; RECORD_WIDTH]) -> Self {
        Self(bytes)
    }

    /// Raw little-endian bytes of this record.
    pub fn as_le_bytes(&self) -> &[u8; RECORD_WIDTH] {
        &self.0
    }

    /// Integer value of this record.
    pub fn value(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Encode `value` as a zero-padded little-endian record.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::RecordTooWide`] if `value` needs more than
    /// 256 bits.
    pub fn encode(value: &BigUint) -> Result<Self> {
        let bits = value.bits();
        if bits > RECORD_BITS {
            return Err(CollectorError::RecordTooWide { bits });
        }

        let le = value.to_bytes_le();
        let mut bytes = [0u8; RECORD_WIDTH];
        bytes[..le.len()].copy_from_slice(&le);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Decode every complete record in `buffer`, in order.
///
/// Bytes `[0, 32)` come out first, then `[32, 64)`, and so on up to and
/// including the last group that ends at or before `buffer.len()`.
pub fn decode_records(buffer: &[u8]) -> impl Iterator<Item = Record> + '_ {
    buffer.chunks_exact(RECORD_WIDTH).map(|chunk| {
        let mut bytes = [0u8; RECORD_WIDTH];
        bytes.copy_from_slice(chunk);
        Record(bytes)
    })
}

/// Number of bytes at the end of `buffer` that do not form a full record.
pub fn trailing_len(buffer: &[u8]) -> usize {
    buffer.len() % RECORD_WIDTH
}

/// Parse an unsigned decimal integer.
///
/// # Errors
///
/// Returns [`CollectorError::InvalidNumber`] for empty, signed or
/// non-decimal input.
pub fn parse_decimal(text: &str) -> Result<BigUint> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CollectorError::InvalidNumber(text.to_string()));
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| CollectorError::InvalidNumber(text.to_string()))
}
