//! `Content-Range` parsing for chunk writes.

use std::str::FromStr;

use crate::error::AppError;

/// Inclusive byte range `start..=end` of a chunk against a declared total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Offset one past the last byte.
    pub fn end_exclusive(&self) -> u64 {
        self.end + 1
    }
}

fn parse_number(raw: &str, field: &str, value: &str) -> Result<u64, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidRange(format!(
            "'{}' has an invalid {} value",
            value, field
        )));
    }
    raw.parse::<u64>().map_err(|_| {
        AppError::InvalidRange(format!("'{}' has an out of range {} value", value, field))
    })
}

/// Parses `bytes <start>-<end>/<total>` with `start <= end < total`.
impl FromStr for ByteRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let rest = value.strip_prefix("bytes ").ok_or_else(|| {
            AppError::InvalidRange(format!("'{}' must start with 'bytes '", value))
        })?;
        let (range, total) = rest
            .trim_start()
            .split_once('/')
            .ok_or_else(|| AppError::InvalidRange(format!("'{}' is missing '/<total>'", value)))?;
        let (start, end) = range.split_once('-').ok_or_else(|| {
            AppError::InvalidRange(format!("'{}' is missing '<start>-<end>'", value))
        })?;

        let start = parse_number(start, "start", value)?;
        let end = parse_number(end, "end", value)?;
        let total = parse_number(total, "total", value)?;

        if start > end {
            return Err(AppError::InvalidRange(format!(
                "'{}' has start after end",
                value
            )));
        }
        if end >= total {
            return Err(AppError::InvalidRange(format!(
                "'{}' ends beyond the total size",
                value
            )));
        }

        Ok(ByteRange { start, end, total })
    }
}
