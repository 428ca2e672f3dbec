//! Transcode provider callbacks.
//!
//! The provider retries anything but a 2xx, so every delivery is acknowledged
//! with 200 whether or not it changed anything.

use axum::{extract::State, http::StatusCode};
use bytes::Bytes;
use chrono::Utc;
use tracing::{error, warn};

use crate::{services::completion::WebhookEvent, state::AppState};

pub async fn transcode_webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "unreadable webhook payload");
            return StatusCode::OK;
        }
    };

    if let Err(err) = state.completion.handle(&event, Utc::now()).await {
        error!(error = %err, event_type = %event.event_type, "webhook reconciliation failed");
    }
    StatusCode::OK
}
