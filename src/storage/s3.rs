use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::DateTimeFormat;
use aws_sdk_s3::Client;
use futures::StreamExt;

use super::{BlobStore, ObjectBody, ObjectHead};
use crate::error::StorageError;
use crate::keys::StorageKey;
use crate::range::ByteRange;
use crate::token::BucketClass;

/// Bucket name for each bucket class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
    pub document: String,
    pub video: String,
}

impl BucketNames {
    pub fn new(document: impl Into<String>, video: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            video: video.into(),
        }
    }

    pub fn for_class(&self, class: BucketClass) -> &str {
        match class {
            BucketClass::Document => &self.document,
            BucketClass::Video => &self.video,
        }
    }
}

/// S3-backed implementation of [`BlobStore`].
///
/// Works with AWS S3 and S3-compatible services (MinIO, R2, etc.). Range
/// requests are passed straight through as the `Range` header of GetObject.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    buckets: BucketNames,
}

impl S3BlobStore {
    pub fn new(client: Client, buckets: BucketNames) -> Self {
        Self { client, buckets }
    }

    pub fn buckets(&self) -> &BucketNames {
        &self.buckets
    }

    fn location(&self, bucket: BucketClass, key: &StorageKey) -> String {
        format!("s3://{}/{}", self.buckets.for_class(bucket), key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn head(&self, bucket: BucketClass, key: &StorageKey) -> Result<ObjectHead, StorageError> {
        let head = self
            .client
            .head_object()
            .bucket(self.buckets.for_class(bucket))
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| head_error(e, &self.location(bucket, key)))?;

        Ok(ObjectHead {
            size: head.content_length().unwrap_or(0).max(0) as u64,
            content_type: head.content_type().map(str::to_string),
            etag: head.e_tag().map(str::to_string),
            last_modified: head
                .last_modified()
                .and_then(|t| t.fmt(DateTimeFormat::HttpDate).ok()),
        })
    }

    async fn get(
        &self,
        bucket: BucketClass,
        key: &StorageKey,
        range: Option<ByteRange>,
    ) -> Result<ObjectBody, StorageError> {
        let mut request = self
            .client
            .get_object()
            .bucket(self.buckets.for_class(bucket))
            .key(key.as_str());

        if let Some(range) = range {
            request = request.range(range.to_header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|e| get_error(e, &self.location(bucket, key)))?;

        let content_length = response.content_length().map(|len| len.max(0) as u64);

        // Chunks are pulled only as the client consumes them; the stream ends
        // at the first transport error.
        let stream = futures::stream::try_unfold(response.body, |mut body| async move {
            match body.next().await {
                Some(Ok(chunk)) => Ok(Some((chunk, body))),
                Some(Err(e)) => Err(StorageError::Stream(e.to_string())),
                None => Ok(None),
            }
        })
        .boxed();

        Ok(ObjectBody {
            stream,
            content_length,
        })
    }
}

fn head_error(e: SdkError<HeadObjectError>, location: &str) -> StorageError {
    let is_not_found = e
        .as_service_error()
        .map(|se| se.is_not_found())
        .unwrap_or(false);

    if is_not_found || raw_status(&e) == Some(404) {
        return StorageError::NotFound(location.to_string());
    }

    StorageError::Backend(format!("{}: {}", location, DisplayErrorContext(&e)))
}

fn get_error(e: SdkError<GetObjectError>, location: &str) -> StorageError {
    let is_not_found = e
        .as_service_error()
        .map(|se| se.is_no_such_key())
        .unwrap_or(false);

    if is_not_found || raw_status(&e) == Some(404) {
        return StorageError::NotFound(location.to_string());
    }

    StorageError::Backend(format!("{}: {}", location, DisplayErrorContext(&e)))
}

fn raw_status<E>(e: &SdkError<E>) -> Option<u16> {
    e.raw_response().map(|r| r.status().as_u16())
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
