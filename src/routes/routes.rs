//! HTTP surface of the media backend.
//!
//! ## Structure
//! - **Probes**: `GET /healthz`, `GET /readyz`
//! - **Accounts**: `POST /api/auth/register`, `POST /api/auth/login`,
//!   `POST /api/auth/github`, `GET /api/me`
//! - **Posts**: `POST|GET /api/posts`, `GET /api/posts/{slug}`, `GET /api/images`
//! - **Videos**: `POST|GET /api/videos`, `DELETE /api/videos/{id}`
//! - **Media ingress**: `POST /api/upload` (multipart, no body size limit)
//! - **Transcode callbacks**: `POST /api/{webhook_endpoint}`

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

use crate::{
    handlers::{
        auth_handlers::{github_login, login, me, register},
        health_handlers::{healthz, readyz},
        post_handlers::{create_post, get_post, list_images, list_posts},
        upload_handlers::upload_media,
        video_handlers::{create_video, delete_video, list_videos},
        webhook_handlers::transcode_webhook,
    },
    state::AppState,
};

/// Build the router. `webhook_endpoint` is the path segment the transcode
/// provider is configured to call.
pub fn routes(webhook_endpoint: &str) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/github", post(github_login))
        .route("/api/me", get(me))
        .route("/api/posts", post(create_post).get(list_posts))
        .route("/api/posts/{slug}", get(get_post))
        .route("/api/images", get(list_images))
        .route("/api/videos", post(create_video).get(list_videos))
        .route("/api/videos/{id}", delete(delete_video))
        .route(
            "/api/upload",
            post(upload_media).layer(DefaultBodyLimit::disable()),
        )
        .route(
            &format!("/api/{}", webhook_endpoint.trim_matches('/')),
            post(transcode_webhook),
        )
}
