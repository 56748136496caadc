//! Blob store client
//!
//! The object store is an external system reached over the network. This module
//! defines the operations the rest of the service consumes and two backends:
//! an S3-compatible client for production and an in-memory store for tests and
//! local development.

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

/// Stream of bytes read from the blob store
///
/// Dropping the stream releases the underlying read handle.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors reported by a blob store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Invalid blob request: {0}")]
    Invalid(String),

    /// Store unreachable or failing; never retried here
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),
}

impl BlobError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// Inclusive byte range `[start, end]`, already resolved against the object size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by the range
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP `Range` header value for this range
    pub fn to_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Result of a successful put
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size: u64,
}

/// Operations consumed from the external blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the bucket if it does not exist yet
    async fn ensure_bucket(&self, bucket: &str) -> BlobResult<()>;

    /// Write an object, replacing any object with the same key
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> BlobResult<PutResult>;

    /// Read object metadata without content
    async fn stat_object(&self, bucket: &str, key: &str) -> BlobResult<ObjectStat>;

    /// Open a read stream over the whole object or a byte range of it
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream>;

    /// Remove an object
    async fn delete_object(&self, bucket: &str, key: &str) -> BlobResult<()>;
}
