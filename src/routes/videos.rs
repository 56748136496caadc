use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::constants::{ERR_TOPIC_NOT_FOUND, ERR_VIDEO_NOT_FOUND};
use crate::error::{AppError, Result};
use crate::models::{
    ActivityType, AuditRefs, NewVideo, ReactionSummary, SetReactionRequest, Video, VideoUpdate,
};
use crate::routes::Actor;
use crate::services::{StepOutcome, TopicRef, UploadFile, UploadRequest};
use crate::AppState;

/// Video details with a freshly minted stream URL
#[derive(Debug, Serialize)]
pub struct VideoDetails {
    #[serde(flatten)]
    pub video: Video,
    pub url: String,
    pub reactions: ReactionSummary,
}

#[derive(Debug, Serialize)]
pub struct DeleteVideoResponse {
    pub message: String,
    pub video_id: Uuid,
    pub blob: StepOutcome,
}

/// Get one video
///
/// This is where stream tokens are minted: the returned `url` carries a token
/// bound to this video id, valid for one hour.
pub async fn get_video(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoDetails>> {
    let video = state
        .metadata
        .find_video(id)
        .await
        .map_err(|e| AppError::from_store(e, ERR_VIDEO_NOT_FOUND))?;

    let id = video.id.to_string();
    let token = state.signer.sign(&id);
    let url = state.config.stream_url(&id, &token);
    let reactions = state.reactions.summary(video.id, &user_id).await?;

    Ok(Json(VideoDetails {
        video,
        url,
        reactions,
    }))
}

/// Active videos of a topic, newest first
pub async fn list_topic_videos(
    State(state): State<AppState>,
    Path(topic_id): Path<Uuid>,
) -> Result<Json<Vec<Video>>> {
    let videos = state.metadata.list_videos_by_topic(topic_id, true).await?;
    Ok(Json(videos))
}

/// Create a video row for a blob that is already stored
pub async fn create_video(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Json(payload): Json<NewVideo>,
) -> Result<(StatusCode, Json<Video>)> {
    payload.validate().map_err(AppError::InvalidInput)?;

    state
        .metadata
        .find_topic(payload.topic_id)
        .await
        .map_err(|e| AppError::from_store(e, ERR_TOPIC_NOT_FOUND))?;

    let video = state.metadata.insert_video(&payload).await?;
    tracing::info!(video_id = %video.id, "Video created");

    state
        .record_activity(
            &user_id,
            ActivityType::VideoCreated,
            AuditRefs::video(video.id)
                .with_topic(video.topic_id)
                .with_metadata(json!({ "title": video.title })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn update_video(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<VideoUpdate>,
) -> Result<Json<Video>> {
    payload.validate().map_err(AppError::InvalidInput)?;

    let video = state
        .metadata
        .update_video(id, &payload)
        .await
        .map_err(|e| AppError::from_store(e, ERR_VIDEO_NOT_FOUND))?;

    state
        .record_activity(
            &user_id,
            ActivityType::VideoUpdated,
            AuditRefs::video(video.id)
                .with_topic(video.topic_id)
                .with_metadata(json!({ "title": video.title })),
        )
        .await;

    Ok(Json(video))
}

/// Delete a video and its blob
pub async fn delete_video(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteVideoResponse>> {
    let deletion = state.cascade.delete_video(&user_id, id).await?;

    Ok(Json(DeleteVideoResponse {
        message: "Video deleted".to_string(),
        video_id: deletion.video_id,
        blob: deletion.blob,
    }))
}

/// Upload a video file under a topic name, creating the topic if needed
pub async fn upload_video(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Video>)> {
    let mut form = UploadForm::read(multipart).await?;
    let topic = TopicRef::Name {
        name: form.required("topic_name")?,
        description: form.optional("topic_description"),
    };

    let video = state.uploads.run(&user_id, form.into_request(topic)?).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// Upload a video file under an existing topic id
pub async fn upload_video_to_topic(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Video>)> {
    let mut form = UploadForm::read(multipart).await?;
    let topic_id = form.required("topic_id")?;
    let topic_id = Uuid::parse_str(&topic_id)
        .map_err(|_| AppError::InvalidInput("topic_id must be a UUID".to_string()))?;

    let video = state
        .uploads
        .run(&user_id, form.into_request(TopicRef::Id(topic_id))?)
        .await?;
    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn set_reaction(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetReactionRequest>,
) -> Result<Json<ReactionSummary>> {
    let summary = state
        .reactions
        .set_reaction(id, &user_id, payload.reaction)
        .await?;
    Ok(Json(summary))
}

pub async fn clear_reaction(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionSummary>> {
    let summary = state.reactions.clear_reaction(id, &user_id).await?;
    Ok(Json(summary))
}

/// Text fields and the file part of an upload form
struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<UploadFile>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut fields = HashMap::new();
        let mut file = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or("video").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file: {}", e)))?;

                file = Some(UploadFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read {}: {}", name, e)))?;
                fields.insert(name, value);
            }
        }

        Ok(Self { fields, file })
    }

    fn required(&mut self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| AppError::InvalidInput(format!("{} is required", name)))
    }

    /// Field value, with blank values treated as absent
    fn optional(&mut self, name: &str) -> Option<String> {
        self.fields
            .remove(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn into_request(mut self, topic: TopicRef) -> Result<UploadRequest> {
        let title = self.required("title")?;
        let description = self.optional("description");
        let tryout_link = self.optional("tryout_link");
        let is_active = match self.optional("is_active").as_deref() {
            None | Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(AppError::InvalidInput(format!(
                    "is_active must be true or false, got {}",
                    other
                )))
            }
        };
        let file = self
            .file
            .ok_or_else(|| AppError::InvalidInput("Video file is required".to_string()))?;

        Ok(UploadRequest {
            topic,
            title,
            description,
            is_active,
            tryout_link,
            file,
        })
    }
}
