//! HTTP handlers

use arp_notify_core::PresenceEntry;
use arp_notify_discovery::MonitorStats;
use arp_notify_line::{parse_request, WebhookError, SIGNATURE_HEADER};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// LINE webhook callback
///
/// Replies to `whoami` with the sender's user ID so operators can find the
/// IDs to put in the target list.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let request = match parse_request(&state.config.line.channel_secret, &body, signature) {
        Ok(request) => request,
        Err(e @ (WebhookError::MissingSignature | WebhookError::InvalidSignature)) => {
            warn!(error = %e, "Rejected webhook callback");
            return StatusCode::BAD_REQUEST;
        }
        Err(WebhookError::MissingSecret) => {
            error!("Webhook callback received but no channel secret is configured");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        Err(e) => {
            warn!(error = %e, "Cannot parse webhook callback");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    debug!(events = request.events.len(), "Webhook callback received");

    for event in &request.events {
        let Some(reply) = event.whoami() else {
            continue;
        };

        info!(user = %reply.user_id, "whoami request");
        match &state.line {
            Some(line) => {
                if let Err(e) = line
                    .reply_message(&reply.reply_token, &[reply.user_id.as_str()])
                    .await
                {
                    warn!(user = %reply.user_id, error = %e, "Failed to reply to whoami");
                }
            }
            None => info!(user = %reply.user_id, "Dry run: whoami reply not sent"),
        }
    }

    StatusCode::OK
}

#[derive(Serialize)]
pub struct PresenceResponse {
    devices: Vec<PresenceEntry>,
    stats: MonitorStats,
}

/// Presence state of every sighted device plus monitor counters
pub async fn presence(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(PresenceResponse {
        devices: state.monitor.presence().await,
        stats: state.monitor.stats(),
    })
}
