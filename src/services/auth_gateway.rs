//! Email/password and GitHub sign-in against the hosted auth provider's REST API.
//!
//! Provider failures never surface as errors here: they are folded into
//! `AuthOutcome::error` so account flows can turn them into field errors.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::http::read_json;
use crate::{config::AuthProviderConfig, errors::RemoteError};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user: Option<ProviderUser>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthOutcome {
    pub user: Option<ProviderUser>,
    pub session: Option<ProviderSession>,
    pub error: Option<String>,
}

impl AuthOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    fn from_session(session: ProviderSession) -> Self {
        Self {
            user: session.user.clone(),
            session: Some(session),
            error: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GithubAuthOutcome {
    /// GitHub login the access token belongs to, if it could be resolved.
    pub login: Option<String>,
    pub outcome: AuthOutcome,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_email(&self, email: &str, password: &str) -> AuthOutcome;
    async fn sign_up_with_email(&self, email: &str, password: &str) -> AuthOutcome;
    async fn sign_in_with_github(&self, access_token: &str, refresh_token: &str)
    -> GithubAuthOutcome;
}

/// Pull a human readable message out of a provider error payload.
fn error_message(err: &RemoteError) -> String {
    match err {
        RemoteError::RemoteRejected { payload, .. } => serde_json::from_str::<Value>(payload)
            .ok()
            .and_then(|body| {
                ["error_description", "msg", "message", "error"]
                    .iter()
                    .find_map(|field| body.get(field).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| payload.clone()),
        other => other.to_string(),
    }
}

/// Sign-up replies with a session when confirmation is disabled and with the
/// bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpReply {
    Session(ProviderSession),
    User(ProviderUser),
}

#[derive(Deserialize)]
struct GithubProfile {
    login: String,
}

#[derive(Clone)]
pub struct SupabaseAuth {
    http: Client,
    config: AuthProviderConfig,
}

impl SupabaseAuth {
    pub fn new(http: Client, config: AuthProviderConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.url.trim_end_matches('/'))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: Value,
    ) -> Result<T, RemoteError> {
        let response = self
            .http
            .post(url)
            .query(query)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn github_login(&self, access_token: &str) -> Result<String, RemoteError> {
        let url = format!("{}/user", self.config.github_api_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("token {access_token}"))
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;
        let profile: GithubProfile = read_json(response).await?;
        Ok(profile.login)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn sign_in_with_email(&self, email: &str, password: &str) -> AuthOutcome {
        let url = self.endpoint("token");
        let body = json!({ "email": email, "password": password });
        match self
            .post_json::<ProviderSession>(&url, &[("grant_type", "password")], body)
            .await
        {
            Ok(session) => AuthOutcome::from_session(session),
            Err(err) => {
                debug!(error = %err, "email sign-in rejected");
                AuthOutcome::failed(error_message(&err))
            }
        }
    }

    async fn sign_up_with_email(&self, email: &str, password: &str) -> AuthOutcome {
        let url = self.endpoint("signup");
        let query: Vec<(&str, &str)> = self
            .config
            .register_redirect
            .as_deref()
            .map(|redirect| ("redirect_to", redirect))
            .into_iter()
            .collect();
        let body = json!({ "email": email, "password": password });
        match self.post_json::<SignUpReply>(&url, &query, body).await {
            Ok(SignUpReply::Session(session)) => AuthOutcome::from_session(session),
            Ok(SignUpReply::User(user)) => AuthOutcome {
                user: Some(user),
                ..Default::default()
            },
            Err(err) => {
                warn!(error = %err, "sign-up rejected");
                AuthOutcome::failed(error_message(&err))
            }
        }
    }

    async fn sign_in_with_github(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> GithubAuthOutcome {
        let login = match self.github_login(access_token).await {
            Ok(login) => login,
            Err(err) => {
                debug!(error = %err, "github profile lookup failed");
                return GithubAuthOutcome {
                    login: None,
                    outcome: AuthOutcome::failed(error_message(&err)),
                };
            }
        };

        let url = self.endpoint("token");
        let body = json!({ "refresh_token": refresh_token });
        let outcome = match self
            .post_json::<ProviderSession>(&url, &[("grant_type", "refresh_token")], body)
            .await
        {
            Ok(session) => AuthOutcome::from_session(session),
            Err(err) => AuthOutcome::failed(error_message(&err)),
        };
        GithubAuthOutcome {
            login: Some(login),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dead_url, spawn_server};
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use std::collections::HashMap;

    fn session_json(user_id: &str) -> Value {
        json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": user_id, "email": "crab@example.com" }
        })
    }

    fn gateway(base: &str) -> SupabaseAuth {
        SupabaseAuth::new(
            Client::new(),
            AuthProviderConfig {
                url: base.to_string(),
                anon_key: "anon".into(),
                register_redirect: Some("https://app.test/welcome".into()),
                github_api_url: base.to_string(),
            },
        )
    }

    async fn provider() -> String {
        let router = Router::new()
            .route(
                "/auth/v1/token",
                post(
                    |Query(q): Query<HashMap<String, String>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some("anon") {
                            return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "no api key"})));
                        }
                        let ok = match q.get("grant_type").map(String::as_str) {
                            Some("password") => body["password"] == "hunter22",
                            Some("refresh_token") => body["refresh_token"] == "refresh",
                            _ => false,
                        };
                        if ok {
                            (StatusCode::OK, Json(session_json("ext-1")))
                        } else {
                            (
                                StatusCode::BAD_REQUEST,
                                Json(json!({
                                    "error": "invalid_grant",
                                    "error_description": "Invalid login credentials"
                                })),
                            )
                        }
                    },
                ),
            )
            .route(
                "/auth/v1/signup",
                post(
                    |Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                        assert_eq!(
                            q.get("redirect_to").map(String::as_str),
                            Some("https://app.test/welcome")
                        );
                        if body["email"] == "taken@example.com" {
                            return (
                                StatusCode::UNPROCESSABLE_ENTITY,
                                Json(json!({"code": 422, "msg": "User already registered"})),
                            );
                        }
                        (
                            StatusCode::OK,
                            Json(json!({"id": "ext-2", "email": body["email"]})),
                        )
                    },
                ),
            )
            .route(
                "/user",
                get(|headers: HeaderMap| async move {
                    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                        Some("token gh-token") => {
                            (StatusCode::OK, Json(json!({"login": "octocrab"})))
                        }
                        _ => (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"message": "Bad credentials"})),
                        ),
                    }
                }),
            );
        spawn_server(router).await
    }

    #[tokio::test]
    async fn email_sign_in() {
        let base = provider().await;
        let auth = gateway(&base);

        let ok = auth.sign_in_with_email("crab@example.com", "hunter22").await;
        assert!(ok.error.is_none());
        assert_eq!(ok.user.unwrap().id, "ext-1");
        assert_eq!(ok.session.unwrap().refresh_token, "refresh");

        let bad = auth.sign_in_with_email("crab@example.com", "wrong").await;
        assert_eq!(bad.error.as_deref(), Some("Invalid login credentials"));
        assert!(bad.session.is_none());
    }

    #[tokio::test]
    async fn sign_up_returns_unconfirmed_user() {
        let base = provider().await;
        let auth = gateway(&base);

        let ok = auth.sign_up_with_email("new@example.com", "hunter22").await;
        assert_eq!(ok.user.unwrap().id, "ext-2");
        assert!(ok.session.is_none());

        let taken = auth.sign_up_with_email("taken@example.com", "hunter22").await;
        assert_eq!(taken.error.as_deref(), Some("User already registered"));
    }

    #[tokio::test]
    async fn github_sign_in_resolves_login_first() {
        let base = provider().await;
        let auth = gateway(&base);

        let ok = auth.sign_in_with_github("gh-token", "refresh").await;
        assert_eq!(ok.login.as_deref(), Some("octocrab"));
        assert!(ok.outcome.session.is_some());

        let bad_token = auth.sign_in_with_github("nope", "refresh").await;
        assert_eq!(bad_token.login, None);
        assert_eq!(bad_token.outcome.error.as_deref(), Some("Bad credentials"));

        let bad_refresh = auth.sign_in_with_github("gh-token", "stale").await;
        assert_eq!(bad_refresh.login.as_deref(), Some("octocrab"));
        assert!(bad_refresh.outcome.error.is_some());
    }

    #[tokio::test]
    async fn unreachable_provider_becomes_an_error_message() {
        let auth = gateway(&dead_url().await);
        let outcome = auth.sign_in_with_email("crab@example.com", "hunter22").await;
        assert!(outcome.error.unwrap().starts_with("no response received"));
    }
}
