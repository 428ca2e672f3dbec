//! Reconciles transcode completion callbacks with stored videos.
//!
//! A video moves from not-ready to ready when the provider reports the asset
//! ready, the asset id matches a stored video, and that video was created
//! inside the recency window. Everything else is acknowledged and ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{RepositoryResult, videos::VideoRepository};

pub const ASSET_READY_EVENT: &str = "video.asset.ready";
pub const READY_STATUS: &str = "ready";
pub const DEFAULT_RECENCY_HOURS: i64 = 24;

#[derive(Deserialize, Clone, Debug)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct WebhookData {
    pub status: Option<String>,
    /// Asset id the event refers to.
    pub id: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    UnexpectedEventType,
    NotReady,
    UnknownVideo,
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied { video: Uuid },
    Ignored(IgnoreReason),
}

#[derive(Clone)]
pub struct CompletionHandler {
    videos: VideoRepository,
    recency: chrono::Duration,
}

impl CompletionHandler {
    pub fn new(videos: VideoRepository, recency: chrono::Duration) -> Self {
        Self { videos, recency }
    }

    pub async fn handle(
        &self,
        event: &WebhookEvent,
        now: DateTime<Utc>,
    ) -> RepositoryResult<CompletionOutcome> {
        use CompletionOutcome::Ignored;

        if event.event_type != ASSET_READY_EVENT {
            debug!(event_type = %event.event_type, "ignoring webhook event");
            return Ok(Ignored(IgnoreReason::UnexpectedEventType));
        }
        if event.data.status.as_deref() != Some(READY_STATUS) {
            return Ok(Ignored(IgnoreReason::NotReady));
        }
        let Some(job_id) = event.data.id.as_deref() else {
            return Ok(Ignored(IgnoreReason::UnknownVideo));
        };
        let Some(video) = self.videos.find_by_job_id(job_id).await? else {
            info!(job_id, "ready event for unknown video");
            return Ok(Ignored(IgnoreReason::UnknownVideo));
        };
        if now - video.created_at >= self.recency {
            info!(job_id, created_at = %video.created_at, "ignoring stale ready event");
            return Ok(Ignored(IgnoreReason::Stale));
        }

        let duration = event.data.duration.unwrap_or(video.duration);
        self.videos.mark_ready(video.id, duration, now).await?;
        info!(job_id, video = %video.id, duration, "video ready");
        Ok(CompletionOutcome::Applied { video: video.id })
    }
}
