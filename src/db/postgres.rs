//! PostgreSQL metadata store

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{MetadataStore, StoreError, StoreResult};
use crate::models::{NewTopic, NewVideo, Reaction, ReactionKind, Topic, TopicUpdate, Video, VideoUpdate};

const TOPIC_COLUMNS: &str = "id, name, description, created_at";
const VIDEO_COLUMNS: &str =
    "id, topic_id, title, description, video_path, is_active, tryout_link, created_at";

/// Metadata store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReactionRow {
    video_id: Uuid,
    user_id: String,
    reaction: String,
}

impl TryFrom<ReactionRow> for Reaction {
    type Error = StoreError;

    fn try_from(row: ReactionRow) -> Result<Self, Self::Error> {
        Ok(Reaction {
            video_id: row.video_id,
            user_id: row.user_id,
            reaction: row.reaction.parse().map_err(StoreError::Invalid)?,
        })
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "topics", db.operation = "select"))]
    async fn find_topic(&self, id: Uuid) -> StoreResult<Topic> {
        let topic = sqlx::query_as::<Postgres, Topic>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(topic)
    }

    #[tracing::instrument(skip(self), fields(db.table = "topics", db.operation = "select"))]
    async fn find_topic_by_name(&self, name: &str) -> StoreResult<Option<Topic>> {
        let topic = sqlx::query_as::<Postgres, Topic>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(topic)
    }

    async fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        let topics = sqlx::query_as::<Postgres, Topic>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(topics)
    }

    #[tracing::instrument(skip(self, topic), fields(db.table = "topics", db.operation = "insert"))]
    async fn insert_topic(&self, topic: &NewTopic) -> StoreResult<Topic> {
        let topic = sqlx::query_as::<Postgres, Topic>(&format!(
            r#"
            INSERT INTO topics (name, description)
            VALUES ($1, $2)
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(&topic.name)
        .bind(&topic.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(topic)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "topics", db.operation = "update"))]
    async fn update_topic(&self, id: Uuid, update: &TopicUpdate) -> StoreResult<Topic> {
        let topic = sqlx::query_as::<Postgres, Topic>(&format!(
            r#"
            UPDATE topics
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(topic)
    }

    #[tracing::instrument(skip(self), fields(db.table = "topics", db.operation = "delete"))]
    async fn delete_topic(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    async fn find_video(&self, id: Uuid) -> StoreResult<Video> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    async fn list_videos_by_topic(&self, topic_id: Uuid, active_only: bool) -> StoreResult<Vec<Video>> {
        let videos = sqlx::query_as::<Postgres, Video>(&format!(
            r#"
            SELECT {VIDEO_COLUMNS}
            FROM videos
            WHERE topic_id = $1 AND (is_active OR NOT $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(topic_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(videos)
    }

    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "insert"))]
    async fn insert_video(&self, video: &NewVideo) -> StoreResult<Video> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            r#"
            INSERT INTO videos (topic_id, title, description, video_path, is_active, tryout_link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(video.topic_id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.video_path)
        .bind(video.is_active)
        .bind(&video.tryout_link)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "videos", db.operation = "update"))]
    async fn update_video(&self, id: Uuid, update: &VideoUpdate) -> StoreResult<Video> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            r#"
            UPDATE videos
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                is_active = COALESCE($4, is_active),
                tryout_link = COALESCE($5, tryout_link)
            WHERE id = $1
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.is_active)
        .bind(&update.tryout_link)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "delete"))]
    async fn delete_video(&self, id: Uuid) -> StoreResult<Video> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "DELETE FROM videos WHERE id = $1 RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self, user_id), fields(db.table = "video_reactions", db.operation = "upsert"))]
    async fn upsert_reaction(
        &self,
        video_id: Uuid,
        user_id: &str,
        reaction: ReactionKind,
    ) -> StoreResult<Reaction> {
        let row = sqlx::query_as::<Postgres, ReactionRow>(
            r#"
            INSERT INTO video_reactions (video_id, user_id, reaction)
            VALUES ($1, $2, $3)
            ON CONFLICT (video_id, user_id)
            DO UPDATE SET reaction = EXCLUDED.reaction, updated_at = NOW()
            RETURNING video_id, user_id, reaction
            "#,
        )
        .bind(video_id)
        .bind(user_id)
        .bind(reaction.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn delete_reaction(&self, video_id: Uuid, user_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM video_reactions WHERE video_id = $1 AND user_id = $2")
            .bind(video_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_reactions(&self, video_id: Uuid) -> StoreResult<Vec<Reaction>> {
        let rows = sqlx::query_as::<Postgres, ReactionRow>(
            "SELECT video_id, user_id, reaction FROM video_reactions WHERE video_id = $1",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reaction::try_from).collect()
    }
}
