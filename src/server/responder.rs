//! Streaming responder.
//!
//! Turns a resolved range and cached object metadata into a response whose
//! body is piped straight from the backing store. Nothing is buffered; when
//! the client goes away the body is dropped and the backend transfer with it.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tracing::{debug, warn};

use crate::cache::ObjectMetadata;
use crate::error::GatewayError;
use crate::keys::{self, StorageKey};
use crate::range::ByteRange;
use crate::storage::BlobStore;
use crate::token::BucketClass;

/// `max-age` for keys that embed a version or timestamp (1 year).
pub const IMMUTABLE_MAX_AGE: u32 = 31_536_000;

/// Default browser-only `max-age` for token-gated content (5 minutes).
pub const DEFAULT_PRIVATE_MAX_AGE: u32 = 300;

/// Maximum length of a sanitized download filename, in characters.
const MAX_FILENAME_CHARS: usize = 200;

/// How the browser should present the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Per-response presentation options.
#[derive(Debug, Clone, Copy)]
pub struct ResponseOptions<'a> {
    /// Client- or directory-supplied filename, sanitized before use
    pub filename: Option<&'a str>,
    pub disposition: Disposition,
    pub private_max_age: u32,
}

/// Fetch the object (or the requested window of it) and build the response.
///
/// `range` is `None` for a full-object response. Backend errors are mapped
/// here: not-found to 404, anything else to 500. A ranged body whose length
/// disagrees with `meta` is refused with [`GatewayError::StaleMetadata`].
pub async fn stream_object(
    blobs: &dyn BlobStore,
    bucket: BucketClass,
    key: &StorageKey,
    meta: &ObjectMetadata,
    range: Option<ByteRange>,
    options: &ResponseOptions<'_>,
) -> Result<Response, GatewayError> {
    let object = blobs.get(bucket, key, range).await?;

    let (status, content_length) = match range {
        Some(range) => {
            // Headers come from cached metadata; the body must match them
            if let Some(actual) = object.content_length.filter(|&len| len != range.len()) {
                return Err(GatewayError::StaleMetadata {
                    expected: range.len(),
                    actual,
                });
            }
            (StatusCode::PARTIAL_CONTENT, range.len())
        }
        None => (
            StatusCode::OK,
            object.content_length.unwrap_or(meta.size),
        ),
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    if let Some(range) = range {
        insert_header(
            &mut headers,
            header::CONTENT_RANGE,
            &range.content_range(meta.size),
        );
    }
    insert_header(
        &mut headers,
        header::CONTENT_TYPE,
        &content_type_for(meta.content_type.as_deref(), key),
    );
    insert_header(
        &mut headers,
        header::CACHE_CONTROL,
        &cache_control_for(key, options.private_max_age),
    );
    insert_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &content_disposition(options.disposition, options.filename, key),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    if let Some(etag) = &meta.etag {
        insert_header(&mut headers, header::ETAG, etag);
    }
    if let Some(last_modified) = &meta.last_modified {
        insert_header(&mut headers, header::LAST_MODIFIED, last_modified);
    }

    debug!(
        bucket = %bucket,
        key = %key,
        status = status.as_u16(),
        content_length = content_length,
        "Streaming object"
    );

    let location = key.to_string();
    let stream = object.stream.inspect_err(move |e| {
        warn!(key = %location, error = %e, "Object stream aborted");
    });

    Ok((status, headers, Body::from_stream(stream)).into_response())
}

/// Header values from the backend are not trusted to be well-formed;
/// unrepresentable values are dropped.
fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "Dropping unrepresentable header value"),
    }
}

// =============================================================================
// Content-Type
// =============================================================================

/// Pick the response Content-Type.
///
/// The backend value wins unless it is missing or one of the generic
/// "unknown binary" types S3 assigns to uploads without a declared type.
pub fn content_type_for(backend: Option<&str>, key: &StorageKey) -> String {
    match backend.map(str::trim) {
        Some(ct) if !ct.is_empty() && !is_generic_content_type(ct) => ct.to_string(),
        _ => infer_content_type(key.as_str()).to_string(),
    }
}

fn is_generic_content_type(ct: &str) -> bool {
    let essence = ct.split(';').next().unwrap_or(ct).trim();
    essence.eq_ignore_ascii_case("application/octet-stream")
        || essence.to_ascii_lowercase().starts_with("binary/")
}

/// Infer a Content-Type from the key's extension.
pub fn infer_content_type(key: &str) -> &'static str {
    match keys::extension(key).as_deref() {
        // Video
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        // Audio
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        // Documents
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("epub") => "application/epub+zip",
        Some("txt") => "text/plain; charset=utf-8",
        Some("vtt") => "text/vtt",
        Some("srt") => "application/x-subrip",
        // Images
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Cache-Control
// =============================================================================

/// Caching directive for a token-gated object.
///
/// Never shared-cacheable. Keys with an embedded version or timestamp are
/// content-addressed and may be cached as immutable.
pub fn cache_control_for(key: &StorageKey, private_max_age: u32) -> String {
    if is_immutable_key(key) {
        format!("private, max-age={}, immutable", IMMUTABLE_MAX_AGE)
    } else {
        format!("private, max-age={}", private_max_age)
    }
}

/// A file stem ending in `-v<digits>` or in a 10-13 digit Unix timestamp
/// (seconds or milliseconds) after a `-`, `_` or `.` separator.
fn is_immutable_key(key: &StorageKey) -> bool {
    let name = key.file_name();
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };

    let without_digits = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = stem.len() - without_digits.len();
    if digits == 0 {
        return false;
    }

    if without_digits.len() > 2 && without_digits.ends_with("-v") {
        return true;
    }

    (10..=13).contains(&digits)
        && without_digits.len() > 1
        && without_digits.ends_with(|c: char| matches!(c, '-' | '_' | '.'))
}

// =============================================================================
// Content-Disposition
// =============================================================================

/// Strip anything that could break out of a quoted header parameter or
/// smuggle a path.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/' | ';'))
        .take(MAX_FILENAME_CHARS)
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Build a Content-Disposition value with an ASCII `filename` fallback and an
/// RFC 5987 `filename*` parameter.
pub fn content_disposition(
    disposition: Disposition,
    requested: Option<&str>,
    key: &StorageKey,
) -> String {
    let filename = requested
        .and_then(sanitize_filename)
        .or_else(|| sanitize_filename(key.file_name()))
        .unwrap_or_else(|| "download".to_string());

    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition.as_str(),
        ascii,
        urlencoding::encode(&filename)
    )
}

// =============================================================================
// Tests
// =============================================================================
