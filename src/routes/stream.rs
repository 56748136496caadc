use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
};
use serde::Deserialize;

use crate::error::Result;
use crate::services::MediaStream;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub token: Option<String>,
}

/// Stream video content
///
/// The capability token in the query string is the only credential. Honors a
/// single `Range: bytes=<start>-<end?>` header with a 206 response.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<MediaStream> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    state
        .stream
        .open(&id, query.token.as_deref(), range)
        .await
}
