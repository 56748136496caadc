use std::sync::Arc;
use uuid::Uuid;

use crate::constants::ERR_VIDEO_NOT_FOUND;
use crate::db::MetadataStore;
use crate::error::{AppError, Result};
use crate::models::{ReactionKind, ReactionSummary};

/// Likes and dislikes on videos
///
/// Holds no locks: the single-row-per-user guarantee comes from the metadata
/// store's upsert on (video, user).
pub struct ReactionService {
    metadata: Arc<dyn MetadataStore>,
}

impl ReactionService {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Set the caller's reaction and return the updated summary
    pub async fn set_reaction(
        &self,
        video_id: Uuid,
        user_id: &str,
        reaction: ReactionKind,
    ) -> Result<ReactionSummary> {
        self.ensure_video(video_id).await?;
        self.metadata
            .upsert_reaction(video_id, user_id, reaction)
            .await?;

        tracing::debug!(video_id = %video_id, reaction = %reaction, "Reaction set");
        self.summary(video_id, user_id).await
    }

    /// Remove the caller's reaction, if any
    pub async fn clear_reaction(&self, video_id: Uuid, user_id: &str) -> Result<ReactionSummary> {
        self.ensure_video(video_id).await?;
        self.metadata.delete_reaction(video_id, user_id).await?;
        self.summary(video_id, user_id).await
    }

    pub async fn summary(&self, video_id: Uuid, user_id: &str) -> Result<ReactionSummary> {
        let reactions = self.metadata.list_reactions(video_id).await?;
        Ok(ReactionSummary::from_reactions(&reactions, user_id))
    }

    async fn ensure_video(&self, video_id: Uuid) -> Result<()> {
        self.metadata
            .find_video(video_id)
            .await
            .map(|_| ())
            .map_err(|e| AppError::from_store(e, ERR_VIDEO_NOT_FOUND))
    }
}
