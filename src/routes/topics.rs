use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::constants::ERR_TOPIC_NOT_FOUND;
use crate::db::StoreError;
use crate::error::{AppError, Result};
use crate::models::{ActivityType, AuditRefs, NewTopic, Topic, TopicUpdate};
use crate::routes::Actor;
use crate::services::CascadeReport;
use crate::AppState;

const ERR_TOPIC_NAME_TAKEN: &str = "A topic with this name already exists";

fn topic_error(err: StoreError) -> AppError {
    match err {
        StoreError::Conflict(_) => AppError::Conflict(ERR_TOPIC_NAME_TAKEN.to_string()),
        other => AppError::from_store(other, ERR_TOPIC_NOT_FOUND),
    }
}

/// All topics, newest first
pub async fn list_topics(State(state): State<AppState>) -> Result<Json<Vec<Topic>>> {
    Ok(Json(state.metadata.list_topics().await?))
}

pub async fn get_topic(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Topic>> {
    let topic = state.metadata.find_topic(id).await.map_err(topic_error)?;
    Ok(Json(topic))
}

pub async fn create_topic(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Json(payload): Json<NewTopic>,
) -> Result<(StatusCode, Json<Topic>)> {
    let payload = payload.normalized().map_err(AppError::InvalidInput)?;
    let topic = state.metadata.insert_topic(&payload).await.map_err(topic_error)?;

    tracing::info!(topic_id = %topic.id, name = %topic.name, "Topic created");
    state
        .record_activity(
            &user_id,
            ActivityType::TopicCreated,
            AuditRefs::topic(topic.id).with_metadata(json!({ "name": topic.name })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn update_topic(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<TopicUpdate>,
) -> Result<Json<Topic>> {
    payload.validate().map_err(AppError::InvalidInput)?;
    let topic = state
        .metadata
        .update_topic(id, &payload)
        .await
        .map_err(topic_error)?;

    state
        .record_activity(
            &user_id,
            ActivityType::TopicUpdated,
            AuditRefs::topic(topic.id).with_metadata(json!({ "name": topic.name })),
        )
        .await;

    Ok(Json(topic))
}

/// Delete a topic with all of its videos and their blobs
pub async fn delete_topic(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<CascadeReport>> {
    let report = state.cascade.delete_topic(&user_id, id).await?;
    Ok(Json(report))
}
