use axum::{Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use super::identity::SessionIdentity;
use crate::{
    errors::AppError, models::user::User, services::accounts::UserResponse, state::AppState,
};

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Tokens issued by GitHub to the client during the OAuth handshake.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GithubLoginRequest {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let response = state
        .accounts
        .register(&req.email, &req.username, &req.password)
        .await?;
    Ok(Json(response))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.accounts.login(&req.username, &req.password).await?))
}

pub async fn github_login(
    State(state): State<AppState>,
    Json(req): Json<GithubLoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let response = state
        .accounts
        .github_login(&req.access_token, &req.refresh_token)
        .await?;
    Ok(Json(response))
}

/// The caller's account, or `null` when the session names no known user.
pub async fn me(
    State(state): State<AppState>,
    SessionIdentity(identity): SessionIdentity,
) -> Result<Json<Option<User>>, AppError> {
    let Ok(id) = Uuid::parse_str(&identity) else {
        return Ok(Json(None));
    };
    Ok(Json(state.users.find_by_id(id).await?))
}
