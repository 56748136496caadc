use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic grouping zero or more videos; names are unique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a topic
#[derive(Debug, Clone, Deserialize)]
pub struct NewTopic {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTopic {
    /// Trim the name and reject blank ones
    pub fn normalized(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("Topic name is required".to_string());
        }
        Ok(Self {
            name,
            description: self.description,
        })
    }
}

/// Partial update of a topic; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TopicUpdate {
    pub fn validate(&self) -> Result<(), String> {
        match &self.name {
            Some(name) if name.trim().is_empty() => Err("Topic name must not be blank".to_string()),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, topic: &mut Topic) {
        if let Some(name) = &self.name {
            topic.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            topic.description = Some(description.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_topic_name_trimmed_and_required() {
        let topic = NewTopic {
            name: "  Rust  ".to_string(),
            description: None,
        };
        assert_eq!(topic.normalized().unwrap().name, "Rust");

        let blank = NewTopic {
            name: "   ".to_string(),
            description: None,
        };
        assert!(blank.normalized().is_err());
    }

    #[test]
    fn test_update_leaves_absent_fields() {
        let mut topic = Topic {
            id: Uuid::new_v4(),
            name: "old".to_string(),
            description: Some("keep".to_string()),
            created_at: Utc::now(),
        };

        let update = TopicUpdate {
            name: Some("new".to_string()),
            description: None,
        };
        assert!(update.validate().is_ok());
        update.apply(&mut topic);

        assert_eq!(topic.name, "new");
        assert_eq!(topic.description.as_deref(), Some("keep"));
        assert!(TopicUpdate {
            name: Some(" ".to_string()),
            description: None
        }
        .validate()
        .is_err());
    }
}
