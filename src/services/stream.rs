//! Range-aware stream proxy
//!
//! Serves video bytes from the blob store to token-holding clients. Bytes are
//! forwarded chunk by chunk as the response body is polled; nothing is buffered
//! beyond the chunk in flight.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use uuid::Uuid;

use crate::constants::{DEFAULT_VIDEO_CONTENT_TYPE, ERR_INVALID_STREAM_TOKEN, ERR_VIDEO_NOT_FOUND};
use crate::db::MetadataStore;
use crate::error::{AppError, Result};
use crate::security::StreamTokenSigner;
use crate::storage::{BlobStore, ByteRange, ByteStream};

/// Parse a `Range` header against an object of `total` bytes
///
/// Only `bytes=<start>-<end?>` is understood. Anything else, including ranges
/// that cannot be satisfied, yields `None` and the full object is served. An
/// end past the object is clamped to the last byte.
pub fn parse_range(header: &str, total: u64) -> Option<ByteRange> {
    let spec = header.trim().strip_prefix("bytes=")?.trim();
    let (start, end) = spec.split_once('-')?;

    if start.is_empty() || !start.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let start: u64 = start.parse().ok()?;

    let last = total.checked_sub(1)?;
    let end = if end.is_empty() {
        last
    } else if end.bytes().all(|b| b.is_ascii_digit()) {
        end.parse::<u64>().ok()?.min(last)
    } else {
        return None;
    };

    (start <= end).then(|| ByteRange::new(start, end))
}

/// Authorizes stream requests and opens blob reads
pub struct StreamProxy {
    signer: StreamTokenSigner,
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    bucket: String,
}

impl StreamProxy {
    pub fn new(
        signer: StreamTokenSigner,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            signer,
            metadata,
            blobs,
            bucket: bucket.into(),
        }
    }

    /// Validate the token for `video_id` and open a read of the video content
    ///
    /// Checks run in order and the first failure is returned. Every token
    /// failure maps to the same `Unauthorized` message.
    pub async fn open(
        &self,
        video_id: &str,
        token: Option<&str>,
        range_header: Option<&str>,
    ) -> Result<MediaStream> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized(ERR_INVALID_STREAM_TOKEN.to_string()))?;

        match self.signer.verify(token) {
            Some(id) if id == video_id => {}
            _ => {
                tracing::warn!(video_id = %video_id, "Stream token rejected");
                return Err(AppError::Unauthorized(ERR_INVALID_STREAM_TOKEN.to_string()));
            }
        }

        let id = Uuid::parse_str(video_id)
            .map_err(|_| AppError::NotFound(ERR_VIDEO_NOT_FOUND.to_string()))?;
        let video = self
            .metadata
            .find_video(id)
            .await
            .map_err(|e| AppError::from_store(e, ERR_VIDEO_NOT_FOUND))?;

        let stat = self.blobs.stat_object(&self.bucket, &video.video_path).await?;
        let range = range_header.and_then(|h| parse_range(h, stat.size));

        let body = self
            .blobs
            .get_object(&self.bucket, &video.video_path, range)
            .await?;

        let content_type = stat
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_VIDEO_CONTENT_TYPE.to_string());

        tracing::debug!(
            video_id = %id,
            total = stat.size,
            range = ?range,
            "Streaming video"
        );

        Ok(MediaStream {
            total: stat.size,
            range,
            content_type,
            body: TrackedBody::new(id, body, range.map_or(stat.size, |r| r.length())),
        })
    }
}

/// Open read of a video, ready to be turned into a 200 or 206 response
pub struct MediaStream {
    pub total: u64,
    pub range: Option<ByteRange>,
    pub content_type: String,
    body: TrackedBody,
}

impl MediaStream {
    pub fn status(&self) -> StatusCode {
        match self.range {
            Some(_) => StatusCode::PARTIAL_CONTENT,
            None => StatusCode::OK,
        }
    }

    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.total, |r| r.length())
    }
}

impl IntoResponse for MediaStream {
    fn into_response(self) -> Response {
        let mut builder = Response::builder()
            .status(self.status())
            .header(header::CONTENT_TYPE, &self.content_type)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_LENGTH, self.content_length());

        if let Some(range) = self.range {
            builder = builder.header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, self.total),
            );
        }

        match builder.body(Body::from_stream(self.body)) {
            Ok(response) => response,
            Err(e) => AppError::Internal(format!("Failed to build stream response: {}", e))
                .into_response(),
        }
    }
}

/// Response body that forwards blob chunks and notes early termination
///
/// Dropping it drops the blob read, which releases the upstream connection.
/// Hyper drops the body when the client goes away.
struct TrackedBody {
    video_id: Uuid,
    inner: ByteStream,
    expected: u64,
    sent: u64,
    finished: bool,
}

impl TrackedBody {
    fn new(video_id: Uuid, inner: ByteStream, expected: u64) -> Self {
        Self {
            video_id,
            inner,
            expected,
            sent: 0,
            finished: false,
        }
    }
}

impl Stream for TrackedBody {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                video_id = %self.video_id,
                sent_bytes = self.sent,
                expected_bytes = self.expected,
                "Stream ended before completion, upstream read released"
            );
        }
    }
}
