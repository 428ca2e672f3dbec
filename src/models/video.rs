//! A transcoded video attached to a post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video whose source lives in object storage and whose playback is served
/// by the transcode provider.
///
/// Rows are created with `ready = false` and `duration = 0` when the transcode
/// job is submitted. The completion webhook flips them to ready exactly once.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,

    /// Slug of the owning post.
    pub slug: String,

    /// Storage object key of the source file.
    pub key: String,

    pub description: String,

    /// Duration in seconds, as reported by the transcode provider.
    pub duration: f64,

    pub ready: bool,

    /// Public playback identifier (unique).
    pub playback_id: String,

    /// External transcode job identifier (unique).
    pub video_id: String,

    pub post_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the caller when registering a new video.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub slug: String,
    pub key: String,
    pub description: String,
    pub post_id: Option<Uuid>,
}
