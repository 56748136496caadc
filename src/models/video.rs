use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Video metadata row
///
/// `video_path` is the blob key of the video content. The link to the blob is
/// by convention only; a row whose blob is missing is an error at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_path: String,
    pub is_active: bool,
    pub tryout_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a video row
#[derive(Debug, Clone, Deserialize)]
pub struct NewVideo {
    pub topic_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_path: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub tryout_link: Option<String>,
}

fn default_active() -> bool {
    true
}

impl NewVideo {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.video_path.trim().is_empty() {
            return Err("video_path is required".to_string());
        }
        Ok(())
    }
}

/// Partial update of a video; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub tryout_link: Option<String>,
}

impl VideoUpdate {
    pub fn validate(&self) -> Result<(), String> {
        match &self.title {
            Some(title) if title.trim().is_empty() => Err("Title must not be blank".to_string()),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, video: &mut Video) {
        if let Some(title) = &self.title {
            video.title = title.clone();
        }
        if let Some(description) = &self.description {
            video.description = Some(description.clone());
        }
        if let Some(is_active) = self.is_active {
            video.is_active = is_active;
        }
        if let Some(link) = &self.tryout_link {
            video.tryout_link = Some(link.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_video_defaults_to_active() {
        let json = format!(
            r#"{{"topic_id":"{}","title":"Intro","video_path":"k"}}"#,
            Uuid::new_v4()
        );
        let video: NewVideo = serde_json::from_str(&json).unwrap();
        assert!(video.is_active);
        assert!(video.validate().is_ok());
    }

    #[test]
    fn test_new_video_requires_title_and_path() {
        let mut video = NewVideo {
            topic_id: Uuid::new_v4(),
            title: " ".to_string(),
            description: None,
            video_path: "k".to_string(),
            is_active: true,
            tryout_link: None,
        };
        assert!(video.validate().is_err());

        video.title = "ok".to_string();
        video.video_path = String::new();
        assert!(video.validate().is_err());
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut video = Video {
            id: Uuid::new_v4(),
            topic_id: Uuid::new_v4(),
            title: "t".to_string(),
            description: None,
            video_path: "k".to_string(),
            is_active: true,
            tryout_link: None,
            created_at: Utc::now(),
        };

        VideoUpdate {
            is_active: Some(false),
            ..Default::default()
        }
        .apply(&mut video);

        assert!(!video.is_active);
        assert_eq!(video.title, "t");
    }
}
