//! Storage key safety.
//!
//! Keys come out of verified tokens, but the gateway still refuses anything
//! that looks like a path escape before a backend call is made. A key that
//! fails here never reaches the object store.

use std::fmt;

use crate::error::KeyError;

/// Maximum key length accepted by S3.
pub const MAX_KEY_LEN: usize = 1024;

/// An object key that passed the safety checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate `raw` as a relative, traversal-free object key.
    ///
    /// Rejects absolute paths, backslashes, control characters, empty
    /// segments, and `.`/`..` segments, including percent-encoded forms.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong { max: MAX_KEY_LEN });
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(KeyError::ControlCharacter);
        }
        if raw.contains('\\') {
            return Err(KeyError::Backslash);
        }
        if raw.starts_with('/') || raw.starts_with('~') || has_drive_prefix(raw) {
            return Err(KeyError::Absolute);
        }

        for segment in raw.split('/') {
            if segment.is_empty() {
                return Err(KeyError::EmptySegment);
            }
            if is_dot_segment(segment) {
                return Err(KeyError::Traversal);
            }
            // Keys are passed to S3 verbatim, but a proxy in front of a
            // compatible store may decode them.
            if let Ok(decoded) = urlencoding::decode(segment) {
                if decoded.contains('/') || decoded.contains('\\') || is_dot_segment(&decoded) {
                    return Err(KeyError::Traversal);
                }
            }
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment, e.g. `intro.mp4` for `videos/course/intro.mp4`.
    pub fn file_name(&self) -> &str {
        file_name(&self.0)
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        extension(&self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

pub(crate) fn extension(key: &str) -> Option<String> {
    let name = file_name(key);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
