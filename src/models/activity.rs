use serde::Serialize;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Kinds of entries written to the activity feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    VideoCreated,
    VideoUpdated,
    VideoDeleted,
    TopicCreated,
    TopicUpdated,
    TopicDeleted,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::VideoCreated => "video_created",
            ActivityType::VideoUpdated => "video_updated",
            ActivityType::VideoDeleted => "video_deleted",
            ActivityType::TopicCreated => "topic_created",
            ActivityType::TopicUpdated => "topic_updated",
            ActivityType::TopicDeleted => "topic_deleted",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities an activity entry points at
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditRefs {
    pub video_id: Option<Uuid>,
    pub topic_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

impl AuditRefs {
    pub fn video(video_id: Uuid) -> Self {
        Self {
            video_id: Some(video_id),
            ..Default::default()
        }
    }

    pub fn topic(topic_id: Uuid) -> Self {
        Self {
            topic_id: Some(topic_id),
            ..Default::default()
        }
    }

    pub fn with_topic(mut self, topic_id: Uuid) -> Self {
        self.topic_id = Some(topic_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
