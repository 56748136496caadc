//! Delete cascade
//!
//! Deleting a video removes its blob (best-effort), its row, then writes an
//! audit entry (best-effort). Deleting a topic writes the topic audit entry
//! first, deletes every video under the topic, active or not, and removes the
//! topic row last.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::best_effort::{best_effort, StepOutcome};
use crate::audit::AuditLog;
use crate::constants::{ERR_TOPIC_HAS_VIDEOS, ERR_TOPIC_NOT_FOUND, ERR_VIDEO_NOT_FOUND};
use crate::db::{MetadataStore, StoreError};
use crate::error::{AppError, Result};
use crate::models::{ActivityType, AuditRefs, Video};
use crate::storage::BlobStore;

/// Outcome of deleting one video
#[derive(Debug, Clone, Serialize)]
pub struct VideoDeletion {
    pub video_id: Uuid,
    pub blob: StepOutcome,
}

/// Outcome of deleting a topic and everything under it
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub topic_id: Uuid,
    pub videos_deleted: usize,
    /// Videos whose row was deleted but whose blob could not be removed
    pub orphaned_blobs: Vec<Uuid>,
}

pub struct DeleteCascade {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    audit: Arc<dyn AuditLog>,
    bucket: String,
}

impl DeleteCascade {
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

    /// Delete one video; `NotFound` if it does not exist
    pub async fn delete_video(&self, actor_id: &str, video_id: Uuid) -> Result<VideoDeletion> {
        let video = self
            .metadata
            .find_video(video_id)
            .await
            .map_err(|e| AppError::from_store(e, ERR_VIDEO_NOT_FOUND))?;

        self.remove_video(actor_id, &video).await
    }

    /// Delete a topic and all of its videos; `NotFound` if the topic does not exist
    ///
    /// A video whose row cannot be deleted does not stop the remaining videos,
    /// but the topic row is then kept and the first such error is returned.
    pub async fn delete_topic(&self, actor_id: &str, topic_id: Uuid) -> Result<CascadeReport> {
        let topic = self
            .metadata
            .find_topic(topic_id)
            .await
            .map_err(|e| AppError::from_store(e, ERR_TOPIC_NOT_FOUND))?;

        // Written while the topic row still exists; the entry references it
        best_effort(
            "audit_append",
            self.audit.append(
                actor_id,
                ActivityType::TopicDeleted,
                AuditRefs::topic(topic.id).with_metadata(json!({ "name": topic.name })),
            ),
        )
        .await;

        let videos = self.metadata.list_videos_by_topic(topic.id, false).await?;

        let mut report = CascadeReport {
            topic_id: topic.id,
            videos_deleted: 0,
            orphaned_blobs: Vec::new(),
        };
        let mut first_failure = None;

        for video in &videos {
            match self.remove_video(actor_id, video).await {
                Ok(deletion) => {
                    report.videos_deleted += 1;
                    if !deletion.blob.is_done() {
                        report.orphaned_blobs.push(video.id);
                    }
                }
                Err(e) => {
                    tracing::warn!(video_id = %video.id, topic_id = %topic.id, error = %e, "Cascade could not delete video, continuing");
                    first_failure.get_or_insert(e);
                }
            }
        }

        // Remaining video rows still reference the topic
        if let Some(err) = first_failure {
            tracing::error!(
                topic_id = %topic.id,
                videos_deleted = report.videos_deleted,
                videos_left = videos.len() - report.videos_deleted,
                "Topic kept, not all of its videos could be deleted"
            );
            return Err(err);
        }

        self.metadata
            .delete_topic(topic.id)
            .await
            .map_err(|e| match e {
                // A video was filed under the topic while it was being emptied
                StoreError::Invalid(_) => AppError::Conflict(ERR_TOPIC_HAS_VIDEOS.to_string()),
                other => AppError::from_store(other, ERR_TOPIC_NOT_FOUND),
            })?;

        tracing::info!(
            topic_id = %topic.id,
            videos_deleted = report.videos_deleted,
            orphaned_blobs = report.orphaned_blobs.len(),
            "Topic deleted"
        );

        Ok(report)
    }

    async fn remove_video(&self, actor_id: &str, video: &Video) -> Result<VideoDeletion> {
        // (a) blob first; a missing or undeletable blob does not stop the row delete
        let blob = best_effort(
            "blob_delete",
            self.blobs.delete_object(&self.bucket, &video.video_path),
        )
        .await;

        // (b) row
        self.metadata
            .delete_video(video.id)
            .await
            .map_err(|e| AppError::from_store(e, ERR_VIDEO_NOT_FOUND))?;

        // (c) audit
        best_effort(
            "audit_append",
            self.audit.append(
                actor_id,
                ActivityType::VideoDeleted,
                AuditRefs::video(video.id)
                    .with_topic(video.topic_id)
                    .with_metadata(json!({ "title": video.title })),
            ),
        )
        .await;

        tracing::info!(video_id = %video.id, blob_deleted = blob.is_done(), "Video deleted");

        Ok(VideoDeletion {
            video_id: video.id,
            blob,
        })
    }
}
