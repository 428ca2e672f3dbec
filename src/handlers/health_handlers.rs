//! Liveness and readiness.
//!
//! The service is ready once the media tables exist and the staging directory
//! accepts the multipart files `POST /api/upload` writes there.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use sqlx::SqlitePool;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

use crate::state::AppState;

const MEDIA_TABLES: [&str; 4] = ["users", "posts", "videos", "images"];

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Result<(), String>> for CheckStatus {
    fn from(result: Result<(), String>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.err(),
        }
    }
}

/// `GET /healthz`. No I/O.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /readyz`. 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let checks = BTreeMap::from([
        ("sqlite", CheckStatus::from(schema_present(&state.db).await)),
        ("upload_dir", CheckStatus::from(staging_writable(&state.upload_dir).await)),
    ]);

    if checks.values().all(|check| check.ok) {
        (StatusCode::OK, Json(ReadyResponse { status: "ok", checks }))
    } else {
        tracing::warn!("readiness check failed");
        let body = ReadyResponse {
            status: "error",
            checks,
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

/// A reachable pool is not enough: an unmigrated database fails every route.
async fn schema_present(db: &SqlitePool) -> Result<(), String> {
    let mut query = sqlx::QueryBuilder::new(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (",
    );
    let mut names = query.separated(", ");
    for table in MEDIA_TABLES {
        names.push_bind(table);
    }
    query.push(")");

    let found: i64 = query
        .build_query_scalar::<i64>()
        .fetch_one(db)
        .await
        .map_err(|err| err.to_string())?;
    if found as usize == MEDIA_TABLES.len() {
        Ok(())
    } else {
        Err(format!(
            "{found} of {} media tables present; run with --migrate",
            MEDIA_TABLES.len()
        ))
    }
}

/// Stage a marker file the same way uploads are staged, then remove it.
async fn staging_writable(dir: &Path) -> Result<(), String> {
    let marker = dir.join(format!(".ready-{}", Uuid::new_v4()));
    let payload = marker.to_string_lossy().into_owned().into_bytes();

    fs::write(&marker, &payload)
        .await
        .map_err(|err| format!("cannot stage files: {err}"))?;
    let read_back = fs::read(&marker).await;
    let removed = fs::remove_file(&marker).await;

    match read_back {
        Ok(bytes) if bytes == payload => {}
        Ok(_) => return Err("staged file came back altered".into()),
        Err(err) => return Err(format!("cannot read staged file: {err}")),
    }
    removed.map_err(|err| format!("cannot clean up staged file: {err}"))
}
