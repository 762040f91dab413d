//! `Range` header parsing.
//!
//! Follows the common server-side rules: ranges past the end are clamped,
//! a suffix larger than the object is unsatisfiable, malformed specs are
//! skipped rather than failing the whole header.

use thiserror::Error;

use crate::storage::ObjectRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range header")]
    Malformed,

    #[error("range not satisfiable")]
    Unsatisfiable,
}

/// A parsed `Range` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRange {
    pub unit: String,
    /// Inclusive `(start, end)` spans, clamped to the object size.
    pub spans: Vec<(u64, u64)>,
}

impl ParsedRange {
    /// The single byte range this header asks for, if it asks for exactly one.
    pub fn single_bytes(&self) -> Option<(u64, u64)> {
        match self.spans.as_slice() {
            [span] if self.unit == "bytes" => Some(*span),
            _ => None,
        }
    }
}

pub fn parse_range(size: u64, header: &str) -> Result<ParsedRange, RangeError> {
    let (unit, specs) = header.split_once('=').ok_or(RangeError::Malformed)?;
    let size = size as i128;

    let spans: Vec<(u64, u64)> = specs
        .split(',')
        .filter_map(|spec| {
            let (first, second) = spec.trim().split_once('-')?;
            let first = first.trim().parse::<i128>().ok();
            let second = second.trim().parse::<i128>().ok();

            let (start, mut end) = match (first, second) {
                (Some(start), Some(end)) => (start, end),
                (Some(start), None) => (start, size - 1),
                (None, Some(suffix)) => (size - suffix, size - 1),
                (None, None) => return None,
            };
            if end > size - 1 {
                end = size - 1;
            }
            if start > end || start < 0 {
                return None;
            }
            Some((start as u64, end as u64))
        })
        .collect();

    if spans.is_empty() {
        return Err(RangeError::Unsatisfiable);
    }
    Ok(ParsedRange {
        unit: unit.trim().to_string(),
        spans,
    })
}

/// Convert an inclusive span into a store range. A span reaching the last
/// byte becomes a suffix read.
pub fn to_object_range((start, end): (u64, u64), size: u64) -> ObjectRange {
    if end + 1 >= size {
        ObjectRange::Suffix { suffix: size - start }
    } else {
        ObjectRange::Offset {
            offset: start,
            length: end - start + 1,
        }
    }
}

/// `Content-Range` value for a served span.
pub fn content_range((start, end): (u64, u64), size: u64) -> String {
    format!("bytes {start}-{end}/{size}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_ranges() {
        assert_eq!(parse_range(1000, "bytes=0-499").unwrap().spans, vec![(0, 499)]);
        assert_eq!(parse_range(1000, "bytes=500-").unwrap().spans, vec![(500, 999)]);
        assert_eq!(parse_range(1000, "bytes=-200").unwrap().spans, vec![(800, 999)]);
        assert_eq!(parse_range(1000, "bytes=900-5000").unwrap().spans, vec![(900, 999)]);
    }

    #[test]
    fn test_unsatisfiable_and_malformed() {
        assert_eq!(parse_range(1000, "bytes=1000-"), Err(RangeError::Unsatisfiable));
        assert_eq!(parse_range(10, "bytes=-20"), Err(RangeError::Unsatisfiable));
        assert_eq!(parse_range(1000, "bytes=abc"), Err(RangeError::Unsatisfiable));
        assert_eq!(parse_range(0, "bytes=0-0"), Err(RangeError::Unsatisfiable));
        assert_eq!(parse_range(1000, "0-10"), Err(RangeError::Malformed));
    }

    #[test]
    fn test_single_bytes() {
        assert_eq!(parse_range(100, "bytes=0-9").unwrap().single_bytes(), Some((0, 9)));
        assert_eq!(parse_range(100, "bytes=0-9,20-29").unwrap().single_bytes(), None);
        assert_eq!(parse_range(100, "items=0-9").unwrap().single_bytes(), None);
    }

    #[test]
    fn test_object_range_conversion() {
        assert_eq!(to_object_range((10, 19), 100), ObjectRange::Offset { offset: 10, length: 10 });
        assert_eq!(to_object_range((90, 99), 100), ObjectRange::Suffix { suffix: 10 });
        assert_eq!(content_range((0, 9), 100), "bytes 0-9/100");
    }
}
