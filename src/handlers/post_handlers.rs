use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::DateTime;
use serde::Deserialize;
use tracing::info;

use super::identity::SessionIdentity;
use crate::{
    db::posts::MAX_PAGE_SIZE,
    errors::AppError,
    models::post::{NewPost, PostWithMedia},
    state::AppState,
};

/// Query params for the post listing.
#[derive(Deserialize, Debug)]
pub struct ListPostsQuery {
    pub limit: Option<usize>,
    /// `createdAt` of the last post already seen, in epoch milliseconds.
    pub cursor: Option<String>,
}

pub async fn create_post(
    State(state): State<AppState>,
    SessionIdentity(creator): SessionIdentity,
    Json(input): Json<NewPost>,
) -> Result<impl IntoResponse, AppError> {
    if input.title.trim().is_empty() || input.slug.trim().is_empty() {
        return Err(AppError::bad_request("title and slug are required"));
    }
    let post = state.posts.create(&creator, &input).await?;
    info!(post = %post.id, slug = %post.slug, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// `GET /api/posts/{slug}`, with the post's videos.
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .posts
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no post with slug `{slug}`")))?;
    let videos = state.videos.list_by_slug(&slug).await?;
    Ok(Json(PostWithMedia { post, videos }))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let cursor = match query.cursor.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => {
            let millis: i64 = raw
                .parse()
                .map_err(|_| AppError::bad_request(format!("invalid cursor `{raw}`")))?;
            let at = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| AppError::bad_request(format!("cursor out of range `{raw}`")))?;
            Some(at)
        }
        None => None,
    };
    let limit = query.limit.unwrap_or(MAX_PAGE_SIZE);
    Ok(Json(state.posts.list_page(limit, cursor).await?))
}

pub async fn list_images(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.images.list().await?))
}
