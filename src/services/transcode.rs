//! Transcode job submission to the video provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::TranscodeConfig, errors::RemoteError};

/// Identifiers handed back when a transcode job is accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeJob {
    pub playback_id: String,
    /// External job (asset) id; completion webhooks reference it.
    pub job_id: String,
}

#[async_trait]
pub trait TranscodeService: Send + Sync {
    async fn submit(
        &self,
        video_url: &str,
        captions_url: Option<&str>,
    ) -> Result<TranscodeJob, RemoteError>;
}

#[derive(Serialize, Debug)]
struct AssetInput<'a> {
    url: &'a str,
    #[serde(flatten)]
    subtitles: Option<SubtitleTrack>,
}

#[derive(Serialize, Debug)]
struct SubtitleTrack {
    #[serde(rename = "type")]
    kind: &'static str,
    text_type: &'static str,
    closed_captions: bool,
    language_code: &'static str,
    name: &'static str,
}

impl SubtitleTrack {
    fn english() -> Self {
        Self {
            kind: "text",
            text_type: "subtitles",
            closed_captions: true,
            language_code: "en-GB",
            name: "English",
        }
    }
}

#[derive(Serialize, Debug)]
struct CreateAsset<'a> {
    input: Vec<AssetInput<'a>>,
    playback_policy: &'static str,
    mp4_support: &'static str,
}

fn asset_request<'a>(video_url: &'a str, captions_url: Option<&'a str>) -> CreateAsset<'a> {
    let mut input = vec![AssetInput {
        url: video_url,
        subtitles: None,
    }];
    if let Some(url) = captions_url {
        input.push(AssetInput {
            url,
            subtitles: Some(SubtitleTrack::english()),
        });
    }
    CreateAsset {
        input,
        playback_policy: "public",
        mp4_support: "standard",
    }
}

#[derive(Deserialize)]
struct AssetEnvelope {
    data: Asset,
}

#[derive(Deserialize)]
struct Asset {
    id: String,
    #[serde(default)]
    playback_ids: Vec<PlaybackId>,
}

#[derive(Deserialize)]
struct PlaybackId {
    id: String,
}

/// Extract the first playback id and the asset id from a create-asset reply.
fn parse_asset(status: u16, payload: String) -> Result<TranscodeJob, RemoteError> {
    let rejected = |payload: String| RemoteError::RemoteRejected { status, payload };
    if !(200..300).contains(&status) {
        return Err(rejected(payload));
    }
    let Ok(envelope) = serde_json::from_str::<AssetEnvelope>(&payload) else {
        return Err(rejected(payload));
    };
    let Some(playback) = envelope.data.playback_ids.into_iter().next() else {
        return Err(rejected(payload));
    };
    Ok(TranscodeJob {
        playback_id: playback.id,
        job_id: envelope.data.id,
    })
}

#[derive(Clone)]
pub struct MuxClient {
    http: Client,
    config: TranscodeConfig,
}

impl MuxClient {
    pub fn new(http: Client, config: TranscodeConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl TranscodeService for MuxClient {
    async fn submit(
        &self,
        video_url: &str,
        captions_url: Option<&str>,
    ) -> Result<TranscodeJob, RemoteError> {
        let url = format!("{}/video/v1/assets", self.config.api_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.token_id, Some(&self.config.token_secret))
            .json(&asset_request(video_url, captions_url))
            .send()
            .await?;

        let status = response.status().as_u16();
        let payload = response.text().await?;
        let job = parse_asset(status, payload).inspect_err(|err| {
            warn!(error = %err, "transcode submission rejected");
        })?;

        info!(job_id = %job.job_id, playback_id = %job.playback_id, "transcode job submitted");
        Ok(job)
    }
}
