//! HTTP `Range` header resolution (RFC 7233, single byte-range subset).
//!
//! Only the first range of a multi-range header is honoured; multipart
//! responses are never produced. Headers that do not match
//! `bytes=digits?-digits?` are ignored and the full object is served.

/// An inclusive byte window within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes in the window. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the backend `Range` request header.
    pub fn to_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// Outcome of resolving a `Range` header against an object size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// Serve the whole object (no header, or a header we ignore)
    Full,
    /// Serve this window with 206
    Partial(ByteRange),
    /// The header is well-formed but cannot be satisfied
    Unsatisfiable,
}

/// Resolve an optional `Range` header value against `total_size`.
pub fn resolve(header: Option<&str>, total_size: u64) -> RangeResolution {
    let Some(header) = header else {
        return RangeResolution::Full;
    };
    let Some((start, end)) = parse_first_range(header) else {
        return RangeResolution::Full;
    };

    match (start, end) {
        (Some(start), None) => {
            if start >= total_size {
                RangeResolution::Unsatisfiable
            } else {
                RangeResolution::Partial(ByteRange::new(start, total_size - 1))
            }
        }
        (None, Some(suffix)) => {
            if suffix == 0 || total_size == 0 {
                RangeResolution::Unsatisfiable
            } else {
                RangeResolution::Partial(ByteRange::new(
                    total_size.saturating_sub(suffix),
                    total_size - 1,
                ))
            }
        }
        (Some(start), Some(end)) => {
            if end < start || start >= total_size {
                RangeResolution::Unsatisfiable
            } else {
                RangeResolution::Partial(ByteRange::new(start, end.min(total_size - 1)))
            }
        }
        (None, None) => RangeResolution::Full,
    }
}

/// Parse `bytes=A-B` into optional bounds, or `None` if the grammar is not matched.
fn parse_first_range(header: &str) -> Option<(Option<u64>, Option<u64>)> {
    let (unit, spec) = header.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return None;
    }

    let first = spec.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;

    let start = parse_bound(start.trim())?;
    let end = parse_bound(end.trim())?;
    Some((start, end))
}

/// `Some(None)` for an empty bound, `Some(Some(n))` for digits, `None` otherwise.
fn parse_bound(value: &str) -> Option<Option<u64>> {
    if value.is_empty() {
        return Some(None);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Some)
}
