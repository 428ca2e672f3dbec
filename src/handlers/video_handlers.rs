use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::identity::SessionIdentity;
use crate::{
    errors::AppError,
    models::video::{NewVideo, Video},
    state::AppState,
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    #[serde(flatten)]
    pub video: NewVideo,
    pub video_url: String,
    pub captions_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct VideosQuery {
    pub slug: String,
}

/// `POST /api/videos`: submit the uploaded source for transcoding and record it.
pub async fn create_video(
    State(state): State<AppState>,
    SessionIdentity(user): SessionIdentity,
    Json(req): Json<CreateVideoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let job = state
        .transcoder
        .submit(&req.video_url, req.captions_url.as_deref())
        .await?;

    let now = Utc::now();
    let NewVideo {
        slug,
        key,
        description,
        post_id,
    } = req.video;
    let video = state
        .videos
        .create(&Video {
            id: Uuid::new_v4(),
            slug,
            key,
            description,
            duration: 0.0,
            ready: false,
            playback_id: job.playback_id,
            video_id: job.job_id,
            post_id,
            created_at: now,
            updated_at: now,
        })
        .await?;

    info!(user = %user, video = %video.id, job_id = %video.video_id, "video registered");
    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos?slug=`
pub async fn list_videos(
    State(state): State<AppState>,
    _identity: SessionIdentity,
    Query(query): Query<VideosQuery>,
) -> Result<impl IntoResponse, AppError> {
    let videos = state.videos.list_by_slug(&query.slug).await?;
    Ok(Json(json!({ "videos": videos })))
}

/// `DELETE /api/videos/{id}`
///
/// Removes the record and schedules removal of its source object. Responds
/// `{"deleted": false}` when no such video exists.
pub async fn delete_video(
    State(state): State<AppState>,
    SessionIdentity(user): SessionIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let Some(video) = state.videos.find_by_id(id).await? else {
        return Ok(Json(json!({ "deleted": false })));
    };
    let deleted = state.videos.delete(id).await?;

    if deleted {
        info!(user = %user, video = %id, key = %video.key, "video deleted");
        let remover = state.remover.clone();
        tokio::spawn(async move {
            if let Err(err) = remover.remove(&video.key, None).await {
                warn!(key = %video.key, error = %err, "background object removal failed");
            }
        });
    }
    Ok(Json(json!({ "deleted": deleted })))
}
