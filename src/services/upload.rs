//! Upload saga
//!
//! topic resolution -> bucket ensure -> blob write -> video row insert
//!
//! The blob store and the metadata store share no transaction. If the row
//! insert fails after the blob was written, the blob is deleted again on a
//! best-effort basis and the caller sees the insert error.

use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::best_effort::best_effort;
use crate::audit::AuditLog;
use crate::constants::ERR_TOPIC_NOT_FOUND;
use crate::db::{MetadataStore, StoreError};
use crate::error::{AppError, Result};
use crate::models::{ActivityType, AuditRefs, NewTopic, NewVideo, Topic, Video};
use crate::storage::BlobStore;

/// Topic an upload is filed under
#[derive(Debug, Clone)]
pub enum TopicRef {
    /// Existing topic; the upload fails if it is absent
    Id(Uuid),
    /// Topic looked up by exact name and created if absent
    Name {
        name: String,
        description: Option<String>,
    },
}

/// Uploaded file part
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub topic: TopicRef,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub tryout_link: Option<String>,
    pub file: UploadFile,
}

impl UploadRequest {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if let TopicRef::Name { name, .. } = &self.topic {
            if name.trim().is_empty() {
                return Err("Topic name is required".to_string());
            }
        }
        if self.file.data.is_empty() {
            return Err("Video file is required".to_string());
        }
        if !self.file.content_type.starts_with("video/") {
            return Err(format!(
                "Unsupported content type: {}",
                self.file.content_type
            ));
        }
        Ok(())
    }
}

/// Blob key for an uploaded file: `{epochMillis}-{8 hex}-{sanitized name}`
///
/// The time and random parts keep concurrent uploads of the same file name
/// apart.
pub fn blob_key(file_name: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &random[..8],
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "video".to_string()
    } else {
        sanitized
    }
}

/// Coordinates the blob write and the metadata insert of an upload
pub struct UploadSaga {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    audit: Arc<dyn AuditLog>,
    bucket: String,
}

impl UploadSaga {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        audit: Arc<dyn AuditLog>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            blobs,
            audit,
            bucket: bucket.into(),
        }
    }

    /// Run the saga and return the created video row
    ///
    /// Steps run strictly in sequence. The error of the first failing step is
    /// returned unchanged.
    pub async fn run(&self, actor_id: &str, request: UploadRequest) -> Result<Video> {
        request.validate().map_err(AppError::InvalidInput)?;

        // 1. Topic
        let topic = self.resolve_topic(actor_id, &request.topic).await?;

        // 2. Blob
        let key = blob_key(&request.file.file_name);
        self.blobs.ensure_bucket(&self.bucket).await?;
        let put = self
            .blobs
            .put_object(
                &self.bucket,
                &key,
                Some(&request.file.content_type),
                request.file.data,
            )
            .await?;

        tracing::info!(key = %key, size_bytes = put.size, topic_id = %topic.id, "Video blob stored");

        // 3. Row
        let new_video = NewVideo {
            topic_id: topic.id,
            title: request.title.trim().to_string(),
            description: request.description,
            video_path: key.clone(),
            is_active: request.is_active,
            tryout_link: request.tryout_link,
        };

        let video = match self.metadata.insert_video(&new_video).await {
            Ok(video) => video,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Video insert failed, removing stored blob");
                // 4. Compensation; its outcome never replaces the insert error
                best_effort(
                    "upload_compensation",
                    self.blobs.delete_object(&self.bucket, &key),
                )
                .await;
                return Err(AppError::from(e));
            }
        };

        tracing::info!(video_id = %video.id, key = %key, "Video uploaded");

        // 5. Audit without holding up the response
        self.audit_detached(
            actor_id,
            ActivityType::VideoCreated,
            AuditRefs::video(video.id)
                .with_topic(topic.id)
                .with_metadata(json!({ "title": video.title, "topic_name": topic.name })),
        );

        Ok(video)
    }

    /// Find the topic for an upload, creating it by name when needed
    async fn resolve_topic(&self, actor_id: &str, topic: &TopicRef) -> Result<Topic> {
        let (name, description) = match topic {
            TopicRef::Id(id) => {
                return self
                    .metadata
                    .find_topic(*id)
                    .await
                    .map_err(|e| AppError::from_store(e, ERR_TOPIC_NOT_FOUND));
            }
            TopicRef::Name { name, description } => (name.trim(), description),
        };

        if let Some(existing) = self.metadata.find_topic_by_name(name).await? {
            return Ok(existing);
        }

        let new_topic = NewTopic {
            name: name.to_string(),
            description: description.clone(),
        };

        match self.metadata.insert_topic(&new_topic).await {
            Ok(created) => {
                tracing::info!(topic_id = %created.id, name = %created.name, "Topic created for upload");
                self.audit_detached(
                    actor_id,
                    ActivityType::TopicCreated,
                    AuditRefs::topic(created.id).with_metadata(json!({ "name": created.name })),
                );
                Ok(created)
            }
            // A concurrent upload created the same name between lookup and insert
            Err(StoreError::Conflict(_)) => self
                .metadata
                .find_topic_by_name(name)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("Topic {} is being modified", name))),
            Err(e) => Err(e.into()),
        }
    }

    fn audit_detached(&self, actor_id: &str, activity: ActivityType, refs: AuditRefs) {
        let audit = self.audit.clone();
        let actor_id = actor_id.to_string();
        tokio::spawn(async move {
            best_effort("audit_append", audit.append(&actor_id, activity, refs)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(file: UploadFile) -> UploadRequest {
        UploadRequest {
            topic: TopicRef::Name {
                name: "Rust".to_string(),
                description: None,
            },
            title: "Intro".to_string(),
            description: None,
            is_active: true,
            tryout_link: None,
            file,
        }
    }

    fn mp4(data: &'static [u8]) -> UploadFile {
        UploadFile {
            file_name: "intro.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("vidéo.webm"), "vid_o.webm");
        assert_eq!(sanitize_file_name(""), "video");
    }

    #[test]
    fn test_blob_key_shape() {
        let key = blob_key("a b.mp4");
        let mut parts = key.splitn(3, '-');

        let millis = parts.next().unwrap();
        assert!(millis.parse::<i64>().is_ok());

        let random = parts.next().unwrap();
        assert_eq!(random.len(), 8);
        assert!(random.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(parts.next().unwrap(), "a_b.mp4");
    }

    #[test]
    fn test_blob_keys_do_not_collide() {
        let keys: std::collections::HashSet<_> = (0..200).map(|_| blob_key("same.mp4")).collect();
        assert_eq!(keys.len(), 200);
    }

    #[test]
    fn test_validation() {
        assert!(request(mp4(b"data")).validate().is_ok());

        assert!(request(mp4(b"")).validate().is_err());

        let mut not_video = request(mp4(b"data"));
        not_video.file.content_type = "image/png".to_string();
        assert!(not_video.validate().is_err());

        let mut untitled = request(mp4(b"data"));
        untitled.title = "  ".to_string();
        assert!(untitled.validate().is_err());

        let mut unnamed = request(mp4(b"data"));
        unnamed.topic = TopicRef::Name {
            name: " ".to_string(),
            description: None,
        };
        assert!(unnamed.validate().is_err());
    }
}
