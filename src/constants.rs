/// Lifetime of a stream capability token (1 hour)
/// Expiry gates the initial request only; transfers already in flight keep going.
pub const STREAM_TOKEN_TTL_MS: i64 = 60 * 60 * 1000;

/// Content type served when the blob store has none recorded
pub const DEFAULT_VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Chunk size used when adapting blob reads into response bodies
pub const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Default request body limit for multipart uploads (2GB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Header carrying the caller id forwarded by the upstream auth gateway
pub const USER_ID_HEADER: &str = "x-user-id";

// =============================================================================
// Error Messages
// =============================================================================

/// Every token failure collapses to this message so callers cannot tell which check failed
pub const ERR_INVALID_STREAM_TOKEN: &str = "Invalid or expired stream token";

/// Error message for a missing caller identity
pub const ERR_MISSING_USER: &str = "Missing authenticated user";

/// Error message for a missing video row
pub const ERR_VIDEO_NOT_FOUND: &str = "Video not found";

/// Error message for a missing topic row
pub const ERR_TOPIC_NOT_FOUND: &str = "Topic not found";

/// Error message for a topic delete that lost a race with a new video
pub const ERR_TOPIC_HAS_VIDEOS: &str = "Topic still has videos";

/// Error message for a metadata row whose blob is gone
pub const ERR_BLOB_NOT_FOUND: &str = "Video content not found";
