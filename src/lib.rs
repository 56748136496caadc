//! VideoHub media server library
//!
//! Stream authorization, upload saga and delete cascade over an S3-compatible
//! blob store and a PostgreSQL metadata store. Exported for testing and reuse.

pub mod audit;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, Result};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use audit::AuditLog;
use db::MetadataStore;
use models::{ActivityType, AuditRefs};
use security::StreamTokenSigner;
use services::{best_effort, DeleteCascade, ReactionService, StreamProxy, UploadSaga};
use storage::BlobStore;

/// Application state shared across all handlers
///
/// Collaborators are built once at startup and handed to every component that
/// needs them.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub signer: StreamTokenSigner,
    pub metadata: Arc<dyn MetadataStore>,
    pub audit: Arc<dyn AuditLog>,
    pub stream: Arc<StreamProxy>,
    pub uploads: Arc<UploadSaga>,
    pub cascade: Arc<DeleteCascade>,
    pub reactions: Arc<ReactionService>,
}

impl AppState {
    pub fn new(
        config: Config,
        signer: StreamTokenSigner,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let bucket = config.storage.bucket.clone();

        Self {
            stream: Arc::new(StreamProxy::new(
                signer.clone(),
                metadata.clone(),
                blobs.clone(),
                bucket.clone(),
            )),
            uploads: Arc::new(UploadSaga::new(
                metadata.clone(),
                blobs.clone(),
                audit.clone(),
                bucket.clone(),
            )),
            cascade: Arc::new(DeleteCascade::new(
                metadata.clone(),
                blobs,
                audit.clone(),
                bucket,
            )),
            reactions: Arc::new(ReactionService::new(metadata.clone())),
            config,
            signer,
            metadata,
            audit,
        }
    }

    /// Append to the activity log, logging and ignoring failures
    pub async fn record_activity(&self, actor_id: &str, activity: ActivityType, refs: AuditRefs) {
        best_effort("audit_append", self.audit.append(actor_id, activity, refs)).await;
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/topics",
            get(routes::list_topics).post(routes::create_topic),
        )
        .route(
            "/topics/:id",
            get(routes::get_topic)
                .put(routes::update_topic)
                .delete(routes::delete_topic),
        )
        .route("/videos", post(routes::create_video))
        .route(
            "/videos/upload",
            post(routes::upload_video).layer(upload_limit.clone()),
        )
        .route(
            "/videos/upload-file",
            post(routes::upload_video_to_topic).layer(upload_limit),
        )
        .route("/videos/topic/:topic_id", get(routes::list_topic_videos))
        .route(
            "/videos/:id",
            get(routes::get_video)
                .put(routes::update_video)
                .delete(routes::delete_video),
        )
        .route("/videos/:id/stream", get(routes::stream_video))
        .route(
            "/videos/:id/reaction",
            post(routes::set_reaction).delete(routes::clear_reaction),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
