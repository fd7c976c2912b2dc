//! HTTP `Range` header handling.

use std::fmt;

/// A single byte range from a client `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-` or `bytes=start-end` (inclusive).
    From { start: u64, end: Option<u64> },
    /// `bytes=-len`: the last `len` bytes.
    Suffix(u64),
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Only single `bytes` ranges are supported; anything else yields `None`
    /// and the request is relayed without a range.
    pub fn parse(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes=")?.trim();
        if spec.contains(',') {
            return None;
        }
        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            let len = end.parse::<u64>().ok()?;
            return (len > 0).then_some(ByteRange::Suffix(len));
        }

        let start = start.parse::<u64>().ok()?;
        let end = if end.is_empty() {
            None
        } else {
            Some(end.parse::<u64>().ok()?)
        };
        if matches!(end, Some(e) if e < start) {
            return None;
        }
        Some(ByteRange::From { start, end })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::From { start, end: Some(end) } => write!(f, "bytes={}-{}", start, end),
            ByteRange::From { start, end: None } => write!(f, "bytes={}-", start),
            ByteRange::Suffix(len) => write!(f, "bytes=-{}", len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges() {
        assert_eq!(
            ByteRange::parse("bytes=0-499"),
            Some(ByteRange::From {
                start: 0,
                end: Some(499)
            })
        );
        assert_eq!(
            ByteRange::parse(" bytes=500- "),
            Some(ByteRange::From {
                start: 500,
                end: None
            })
        );
        assert_eq!(ByteRange::parse("bytes=-200"), Some(ByteRange::Suffix(200)));
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert_eq!(ByteRange::parse("items=0-1"), None);
        assert_eq!(ByteRange::parse("bytes=0-1,5-6"), None);
        assert_eq!(ByteRange::parse("bytes=10-5"), None);
        assert_eq!(ByteRange::parse("bytes=abc-"), None);
        assert_eq!(ByteRange::parse("bytes=-0"), None);
    }

    #[test]
    fn test_display_normalizes() {
        assert_eq!(
            ByteRange::parse("bytes= 5 - 9").unwrap().to_string(),
            "bytes=5-9"
        );
        assert_eq!(ByteRange::Suffix(3).to_string(), "bytes=-3");
    }
}
