//! `POST /api/upload`: multipart form ingress for video and caption files.
//!
//! Each file part is staged under the upload directory, pushed to object
//! storage through the upload orchestrator, then removed locally.

use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
    http::StatusCode,
    response::IntoResponse,
};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::identity::SessionIdentity;
use crate::{errors::AppError, models::storage::UploadOutcome, state::AppState};

const VIDEO_FIELD: &str = "video";
const CAPTIONS_FIELD: &str = "captions";

#[derive(Serialize, Debug, Default)]
pub struct UploadResponse {
    pub captions: Option<UploadedFile>,
    pub video: Option<UploadedFile>,
    pub successful: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Version id assigned by storage, when the bucket is versioned.
    pub id: Option<String>,
    pub key: String,
    pub url: String,
}

#[derive(Debug)]
struct StagedFile {
    field: &'static str,
    path: PathBuf,
    key: String,
    content_type: String,
    size: u64,
}

/// Replace anything outside `[A-Za-z0-9._-]` so the name is safe in a key and a URL.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

fn object_key(field: &str, file_name: &str) -> String {
    format!("{field}/{}-{}", Uuid::new_v4(), sanitize_file_name(file_name))
}

async fn stage_field(
    field: &mut Field<'_>,
    name: &'static str,
    upload_dir: &Path,
) -> Result<StagedFile, AppError> {
    let file_name = field.file_name().unwrap_or(name).to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let path = upload_dir.join(format!(".staged-{}", Uuid::new_v4()));

    let mut file = fs::File::create(&path)
        .await
        .map_err(|err| AppError::internal(format!("staging upload: {err}")))?;
    let mut size = 0u64;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                discard(&path).await;
                return Err(AppError::bad_request(format!("reading `{name}` part: {err}")));
            }
        };
        if let Err(err) = file.write_all(&chunk).await {
            discard(&path).await;
            return Err(AppError::internal(format!("staging upload: {err}")));
        }
        size += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|err| AppError::internal(format!("staging upload: {err}")))?;

    debug!(field = name, size, path = %path.display(), "staged form file");
    Ok(StagedFile {
        field: name,
        key: object_key(name, &file_name),
        path,
        content_type,
        size,
    })
}

async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "could not remove staged file");
    }
}

/// Drain the form, staging the recognised file parts and skipping the rest.
async fn stage_form(multipart: &mut Multipart, upload_dir: &Path) -> Result<Vec<StagedFile>, AppError> {
    let mut staged: Vec<StagedFile> = Vec::new();
    loop {
        let next = match multipart.next_field().await {
            Ok(next) => next,
            Err(err) => {
                for file in &staged {
                    discard(&file.path).await;
                }
                return Err(AppError::bad_request(format!("malformed form: {err}")));
            }
        };
        let Some(mut field) = next else { break };

        let name = match field.name() {
            Some(VIDEO_FIELD) => VIDEO_FIELD,
            Some(CAPTIONS_FIELD) => CAPTIONS_FIELD,
            other => {
                debug!(field = other.unwrap_or("<unnamed>"), "skipping form field");
                continue;
            }
        };
        if staged.iter().any(|file| file.field == name) {
            continue;
        }
        match stage_field(&mut field, name, upload_dir).await {
            Ok(file) => staged.push(file),
            Err(err) => {
                for file in &staged {
                    discard(&file.path).await;
                }
                return Err(err);
            }
        }
    }
    Ok(staged)
}

pub async fn upload_media(
    State(state): State<AppState>,
    SessionIdentity(user): SessionIdentity,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let staged = stage_form(&mut multipart, &state.upload_dir).await?;
    if !staged.iter().any(|file| file.field == VIDEO_FIELD) {
        for file in &staged {
            discard(&file.path).await;
        }
        return Err(AppError::bad_request("missing `video` file part"));
    }

    let uploads = staged.iter().map(|file| {
        state
            .uploader
            .upload(&file.content_type, &file.key, &file.path, file.size)
    });
    let results = join_all(uploads).await;
    for file in &staged {
        discard(&file.path).await;
    }

    let mut response = UploadResponse {
        successful: true,
        ..Default::default()
    };
    for (file, result) in staged.iter().zip(results) {
        let UploadOutcome {
            read_url,
            object_version_id,
        } = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(user = %user, key = %file.key, error = %err, "media upload failed");
                return Ok((
                    StatusCode::BAD_GATEWAY,
                    Json(UploadResponse::default()),
                ));
            }
        };
        let uploaded = UploadedFile {
            id: object_version_id,
            key: file.key.clone(),
            url: read_url,
        };
        match file.field {
            VIDEO_FIELD => response.video = Some(uploaded),
            _ => response.captions = Some(uploaded),
        }
    }

    info!(
        user = %user,
        video = response.video.as_ref().map(|f| f.key.as_str()),
        captions = response.captions.as_ref().map(|f| f.key.as_str()),
        "media uploaded"
    );
    Ok((StatusCode::OK, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_made_key_safe() {
        assert_eq!(sanitize_file_name("My Clip (final).mp4"), "My-Clip--final-.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "-..-etc-passwd");
        assert_eq!(sanitize_file_name("..."), "upload");
    }

    #[test]
    fn keys_are_namespaced_by_field() {
        let key = object_key("captions", "en.vtt");
        assert!(key.starts_with("captions/"));
        assert!(key.ends_with("-en.vtt"));
    }
}
