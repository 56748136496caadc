//! In-memory metadata store
//!
//! Mirrors the constraints of the PostgreSQL schema (unique topic names,
//! video to topic references, one reaction per video and user) so services can
//! be tested without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MetadataStore, StoreError, StoreResult};
use crate::models::{NewTopic, NewVideo, Reaction, ReactionKind, Topic, TopicUpdate, Video, VideoUpdate};

#[derive(Default)]
struct Tables {
    topics: HashMap<Uuid, (u64, Topic)>,
    videos: HashMap<Uuid, (u64, Video)>,
    reactions: HashMap<(Uuid, String), ReactionKind>,
}

/// Metadata store kept in process memory
#[derive(Default)]
pub struct MemoryMetadataStore {
    tables: RwLock<Tables>,
    seq: AtomicU64,
    fail_video_inserts: AtomicBool,
    failing_video_deletes: RwLock<HashSet<Uuid>>,
    miss_next_name_lookup: AtomicBool,
    unavailable: AtomicBool,
    video_deletes: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later video insert fail as if the store were unreachable
    pub fn fail_video_inserts(&self, fail: bool) {
        self.fail_video_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make deletes of one video row fail as if the store were unreachable
    pub async fn fail_video_delete_for(&self, id: Uuid) {
        self.failing_video_deletes.write().await.insert(id);
    }

    /// Have the next topic lookup by name report no match, as a reader racing
    /// a concurrent insert would see
    pub fn miss_next_name_lookup(&self) {
        self.miss_next_name_lookup.store(true, Ordering::SeqCst);
    }

    /// Make every operation fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of video rows removed so far
    pub fn video_deletes(&self) -> usize {
        self.video_deletes.load(Ordering::SeqCst)
    }

    pub async fn video_count(&self) -> usize {
        self.tables.read().await.videos.len()
    }

    pub async fn topic_count(&self) -> usize {
        self.tables.read().await.topics.len()
    }

    pub async fn reaction_count(&self) -> usize {
        self.tables.read().await.reactions.len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory metadata store offline".to_string()));
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }
}

fn name_taken(tables: &Tables, name: &str, except: Option<Uuid>) -> bool {
    tables
        .topics
        .values()
        .any(|(_, t)| t.name == name && Some(t.id) != except)
}

/// Newest first; insertion order breaks timestamp ties
fn newest_first<T>(mut rows: Vec<(u64, T)>, created: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    rows.sort_by(|(sa, a), (sb, b)| created(b).cmp(&created(a)).then(sb.cmp(sa)));
    rows.into_iter().map(|(_, row)| row).collect()
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }

    async fn find_topic(&self, id: Uuid) -> StoreResult<Topic> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .topics
            .get(&id)
            .map(|(_, t)| t.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_topic_by_name(&self, name: &str) -> StoreResult<Option<Topic>> {
        self.check_available()?;
        if self.miss_next_name_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .tables
            .read()
            .await
            .topics
            .values()
            .find(|(_, t)| t.name == name)
            .map(|(_, t)| t.clone()))
    }

    async fn list_topics(&self) -> StoreResult<Vec<Topic>> {
        self.check_available()?;
        let rows = self.tables.read().await.topics.values().cloned().collect();
        Ok(newest_first(rows, |t: &Topic| t.created_at))
    }

    async fn insert_topic(&self, topic: &NewTopic) -> StoreResult<Topic> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if name_taken(&tables, &topic.name, None) {
            return Err(StoreError::Conflict(format!(
                "duplicate topic name: {}",
                topic.name
            )));
        }

        let row = Topic {
            id: Uuid::new_v4(),
            name: topic.name.clone(),
            description: topic.description.clone(),
            created_at: Utc::now(),
        };
        tables.topics.insert(row.id, (self.next_seq(), row.clone()));
        Ok(row)
    }

    async fn update_topic(&self, id: Uuid, update: &TopicUpdate) -> StoreResult<Topic> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(name) = &update.name {
            if name_taken(&tables, name.trim(), Some(id)) {
                return Err(StoreError::Conflict(format!("duplicate topic name: {}", name)));
            }
        }

        let (_, topic) = tables.topics.get_mut(&id).ok_or(StoreError::NotFound)?;
        update.apply(topic);
        Ok(topic.clone())
    }

    async fn delete_topic(&self, id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.topics.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if tables.videos.values().any(|(_, v)| v.topic_id == id) {
            return Err(StoreError::Invalid(
                "topic is still referenced by videos".to_string(),
            ));
        }
        tables.topics.remove(&id);
        Ok(())
    }

    async fn find_video(&self, id: Uuid) -> StoreResult<Video> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .videos
            .get(&id)
            .map(|(_, v)| v.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_videos_by_topic(&self, topic_id: Uuid, active_only: bool) -> StoreResult<Vec<Video>> {
        self.check_available()?;
        let rows = self
            .tables
            .read()
            .await
            .videos
            .values()
            .filter(|(_, v)| v.topic_id == topic_id && (v.is_active || !active_only))
            .cloned()
            .collect();
        Ok(newest_first(rows, |v: &Video| v.created_at))
    }

    async fn insert_video(&self, video: &NewVideo) -> StoreResult<Video> {
        self.check_available()?;
        if self.fail_video_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("video insert rejected".to_string()));
        }

        let mut tables = self.tables.write().await;
        if !tables.topics.contains_key(&video.topic_id) {
            return Err(StoreError::Invalid(format!(
                "topic {} does not exist",
                video.topic_id
            )));
        }

        let row = Video {
            id: Uuid::new_v4(),
            topic_id: video.topic_id,
            title: video.title.clone(),
            description: video.description.clone(),
            video_path: video.video_path.clone(),
            is_active: video.is_active,
            tryout_link: video.tryout_link.clone(),
            created_at: Utc::now(),
        };
        tables.videos.insert(row.id, (self.next_seq(), row.clone()));
        Ok(row)
    }

    async fn update_video(&self, id: Uuid, update: &VideoUpdate) -> StoreResult<Video> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let (_, video) = tables.videos.get_mut(&id).ok_or(StoreError::NotFound)?;
        update.apply(video);
        Ok(video.clone())
    }

    async fn delete_video(&self, id: Uuid) -> StoreResult<Video> {
        self.check_available()?;
        if self.failing_video_deletes.read().await.contains(&id) {
            return Err(StoreError::Unavailable(format!("delete of video {} rejected", id)));
        }
        let mut tables = self.tables.write().await;
        let (_, video) = tables.videos.remove(&id).ok_or(StoreError::NotFound)?;
        // video_reactions rows go with their video
        tables.reactions.retain(|(video_id, _), _| *video_id != id);
        self.video_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(video)
    }

    async fn upsert_reaction(
        &self,
        video_id: Uuid,
        user_id: &str,
        reaction: ReactionKind,
    ) -> StoreResult<Reaction> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.videos.contains_key(&video_id) {
            return Err(StoreError::Invalid(format!("video {} does not exist", video_id)));
        }

        tables
            .reactions
            .insert((video_id, user_id.to_string()), reaction);
        Ok(Reaction {
            video_id,
            user_id: user_id.to_string(),
            reaction,
        })
    }

    async fn delete_reaction(&self, video_id: Uuid, user_id: &str) -> StoreResult<()> {
        self.check_available()?;
        self.tables
            .write()
            .await
            .reactions
            .remove(&(video_id, user_id.to_string()));
        Ok(())
    }

    async fn list_reactions(&self, video_id: Uuid) -> StoreResult<Vec<Reaction>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .reactions
            .iter()
            .filter(|((v, _), _)| *v == video_id)
            .map(|((v, user), kind)| Reaction {
                video_id: *v,
                user_id: user.clone(),
                reaction: *kind,
            })
            .collect())
    }
}
