//! Byte range requests (`"<start>-<end>"` or whole file).

use std::fmt;
use std::str::FromStr;

/// Error returned for a malformed range string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("invalid byte range: {0:?}")]
    Malformed(String),
}

/// A span of a file (or of a directory's entry list) to stream.
///
/// `Span` always satisfies `0 <= start <= end`; `end` is exclusive when the
/// range is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteRange {
    #[default]
    Whole,
    Span {
        start: i64,
        end: i64,
    },
}

impl ByteRange {
    /// Builds a validated span.
    pub fn span(start: i64, end: i64) -> Result<Self, RangeError> {
        if start < 0 || end < 0 || start > end {
            return Err(RangeError::Malformed(format!("{start}-{end}")));
        }
        Ok(ByteRange::Span { start, end })
    }

    /// Parses `""` as the whole file and `"<start>-<end>"` as a span.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        if input.is_empty() {
            return Ok(ByteRange::Whole);
        }
        let malformed = || RangeError::Malformed(input.to_string());
        let (start, end) = input.split_once('-').ok_or_else(malformed)?;
        let start: i64 = start.parse().map_err(|_| malformed())?;
        let end: i64 = end.parse().map_err(|_| malformed())?;
        Self::span(start, end).map_err(|_| malformed())
    }

    pub fn is_whole(&self) -> bool {
        matches!(self, ByteRange::Whole)
    }

    /// First offset covered (0 for the whole file).
    pub fn start(&self) -> i64 {
        match self {
            ByteRange::Whole => 0,
            ByteRange::Span { start, .. } => *start,
        }
    }

    /// Exclusive end, or `None` for the whole file.
    pub fn end(&self) -> Option<i64> {
        match self {
            ByteRange::Whole => None,
            ByteRange::Span { end, .. } => Some(*end),
        }
    }
}

impl FromStr for ByteRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ByteRange::parse(s)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::Whole => Ok(()),
            ByteRange::Span { start, end } => write!(f, "{start}-{end}"),
        }
    }
}
