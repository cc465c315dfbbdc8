use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default lifetime of a document-viewing token (5 minutes).
pub const DEFAULT_DOCUMENT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of a video token, sized to one playback session (3 hours).
pub const DEFAULT_VIDEO_TOKEN_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Logical partition of the backing object store.
///
/// Each class maps to its own bucket and its own serve route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketClass {
    Document,
    Video,
}

impl BucketClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketClass::Document => "document",
            BucketClass::Video => "video",
        }
    }
}

impl fmt::Display for BucketClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" | "documents" | "doc" => Ok(BucketClass::Document),
            "video" | "videos" => Ok(BucketClass::Video),
            other => Err(format!(
                "unknown bucket class '{}' (expected 'document' or 'video')",
                other
            )),
        }
    }
}

/// What a token grants: one subject, one key, one bucket class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub subject: String,
    pub resource_key: String,
    pub bucket_class: BucketClass,
}

impl Grant {
    pub fn new(
        subject: impl Into<String>,
        resource_key: impl Into<String>,
        bucket_class: BucketClass,
    ) -> Self {
        Self {
            subject: subject.into(),
            resource_key: resource_key.into(),
            bucket_class,
        }
    }
}

/// Claims carried inside a token.
///
/// Field names are kept short on the wire since tokens travel in query
/// strings and cookies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject: String,

    #[serde(rename = "key")]
    pub resource_key: String,

    #[serde(rename = "bkt")]
    pub bucket_class: BucketClass,

    /// Unix epoch seconds
    #[serde(rename = "iat")]
    pub issued_at: u64,

    /// Unix epoch seconds
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

impl Claims {
    /// The grant these claims were minted from.
    pub fn grant(&self) -> Grant {
        Grant::new(
            self.subject.clone(),
            self.resource_key.clone(),
            self.bucket_class,
        )
    }

    /// Seconds of validity left at `now`.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}

/// TTL presets per bucket class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub document: Duration,
    pub video: Duration,
}

impl TokenTtl {
    pub fn new(document: Duration, video: Duration) -> Self {
        Self { document, video }
    }

    pub fn for_class(&self, class: BucketClass) -> Duration {
        match class {
            BucketClass::Document => self.document,
            BucketClass::Video => self.video,
        }
    }
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_TOKEN_TTL, DEFAULT_VIDEO_TOKEN_TTL)
    }
}
