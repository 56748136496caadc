//! Metadata store client
//!
//! Topics, videos and reactions live in an external relational store. The
//! trait below is everything the service needs from it; the PostgreSQL
//! implementation is used in production and the in-memory one in tests.

pub mod memory;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewTopic, NewVideo, Reaction, ReactionKind, Topic, TopicUpdate, Video, VideoUpdate};

pub use memory::MemoryMetadataStore;
pub use pool::create_pool;
pub use postgres::PgMetadataStore;

/// Result type for metadata operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by the metadata store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed row does not exist
    #[error("Row not found")]
    NotFound,

    /// A unique constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The write violated a reference or check constraint
    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() || db.is_check_violation() => {
                StoreError::Invalid(db.message().to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Operations consumed from the metadata store
///
/// Single-row lookups and writes by id return `StoreError::NotFound` when the
/// row is absent. Listings return rows newest first.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Cheap connectivity check
    async fn ping(&self) -> StoreResult<()>;

    // Topics

    async fn find_topic(&self, id: Uuid) -> StoreResult<Topic>;

    /// Exact-match lookup by name
    async fn find_topic_by_name(&self, name: &str) -> StoreResult<Option<Topic>>;

    async fn list_topics(&self) -> StoreResult<Vec<Topic>>;

    /// Insert a topic; `Conflict` if the name is taken
    async fn insert_topic(&self, topic: &NewTopic) -> StoreResult<Topic>;

    async fn update_topic(&self, id: Uuid, update: &TopicUpdate) -> StoreResult<Topic>;

    async fn delete_topic(&self, id: Uuid) -> StoreResult<()>;

    // Videos

    async fn find_video(&self, id: Uuid) -> StoreResult<Video>;

    /// Videos of one topic; `active_only` hides inactive rows
    async fn list_videos_by_topic(&self, topic_id: Uuid, active_only: bool) -> StoreResult<Vec<Video>>;

    /// Insert a video; `Invalid` if the topic does not exist
    async fn insert_video(&self, video: &NewVideo) -> StoreResult<Video>;

    async fn update_video(&self, id: Uuid, update: &VideoUpdate) -> StoreResult<Video>;

    /// Delete a video row and return it
    async fn delete_video(&self, id: Uuid) -> StoreResult<Video>;

    // Reactions

    /// Insert or replace the reaction of `user_id` on `video_id`
    ///
    /// Relies on the store's unique constraint over (video, user); concurrent
    /// writers converge to one row holding the last applied value.
    async fn upsert_reaction(
        &self,
        video_id: Uuid,
        user_id: &str,
        reaction: ReactionKind,
    ) -> StoreResult<Reaction>;

    /// Remove a reaction; removing an absent reaction is not an error
    async fn delete_reaction(&self, video_id: Uuid, user_id: &str) -> StoreResult<()>;

    async fn list_reactions(&self, video_id: Uuid) -> StoreResult<Vec<Reaction>>;
}
