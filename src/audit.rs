//! Activity feed sink
//!
//! Appends are best-effort: callers log a failed append and carry on.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::db::{MetadataStore, StoreError};
use crate::models::{ActivityType, AuditRefs};

#[derive(Error, Debug)]
pub enum AuditError {
    /// The entry referenced something the sink would not accept
    #[error("Audit entry rejected: {0}")]
    Rejected(String),

    #[error("Audit log unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AuditError::Rejected(db.message().to_string())
            }
            _ => AuditError::Unavailable(err.to_string()),
        }
    }
}

/// Append-only activity log
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(
        &self,
        actor_id: &str,
        activity: ActivityType,
        refs: AuditRefs,
    ) -> Result<(), AuditError>;
}

/// Activity log stored in the `recent_activity` table
#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(
        &self,
        actor_id: &str,
        activity: ActivityType,
        refs: AuditRefs,
    ) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO recent_activity (actor_id, activity_type, video_id, topic_id, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(actor_id)
        .bind(activity.as_str())
        .bind(refs.video_id)
        .bind(refs.topic_id)
        .bind(refs.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Entry recorded by [`MemoryAuditLog`]
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub actor_id: String,
    pub activity: ActivityType,
    pub refs: AuditRefs,
}

/// In-memory activity log for tests
///
/// When built with [`MemoryAuditLog::referencing`], an entry naming a topic is
/// rejected unless that topic exists, like the foreign key on the real table.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    topics: Option<Arc<dyn MetadataStore>>,
    failing: AtomicBool,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn referencing(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            topics: Some(store),
            ..Self::default()
        }
    }

    /// Make every later append fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(
        &self,
        actor_id: &str,
        activity: ActivityType,
        refs: AuditRefs,
    ) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable("memory audit log offline".to_string()));
        }

        if let (Some(store), Some(topic_id)) = (&self.topics, refs.topic_id) {
            match store.find_topic(topic_id).await {
                Ok(_) => {}
                Err(StoreError::NotFound) => {
                    return Err(AuditError::Rejected(format!(
                        "topic {} does not exist",
                        topic_id
                    )))
                }
                Err(e) => return Err(AuditError::Unavailable(e.to_string())),
            }
        }

        self.entries.write().await.push(AuditEntry {
            actor_id: actor_id.to_string(),
            activity,
            refs,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryMetadataStore;
    use crate::models::NewTopic;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_rejects_entry_for_missing_topic() {
        let store = Arc::new(MemoryMetadataStore::new());
        let log = MemoryAuditLog::referencing(store.clone());

        let err = log
            .append("admin", ActivityType::TopicDeleted, AuditRefs::topic(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Rejected(_)));

        let topic = store
            .insert_topic(&NewTopic {
                name: "t".to_string(),
                description: None,
            })
            .await
            .unwrap();
        log.append("admin", ActivityType::TopicDeleted, AuditRefs::topic(topic.id))
            .await
            .unwrap();
        assert_eq!(log.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_log() {
        let log = MemoryAuditLog::new();
        log.set_failing(true);
        assert!(log
            .append("a", ActivityType::VideoCreated, AuditRefs::default())
            .await
            .is_err());
        assert!(log.entries().await.is_empty());
    }
}
