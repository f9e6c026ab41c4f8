use super::state::AppState;
use crate::ids::{ChannelId, GroupId};
use crate::session::{StartError, StopError, StopSummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub group_id: u64,
    /// Channel identifier as entered by the user; must be numeric.
    pub channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub group_id: u64,
    pub channel_id: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub message: String,
    pub channel_id: ChannelId,
    pub session_dir: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: String,
    pub message: String,
    pub summary: StopSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn parse_channel_id(raw: &str) -> Result<ChannelId, axum::response::Response> {
    raw.trim()
        .parse::<u64>()
        .map(ChannelId)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Channel ID must be numeric."))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Connect to a voice channel and start recording
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> impl IntoResponse {
    let channel = match parse_channel_id(&req.channel_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let group = GroupId(req.group_id);

    info!("Start requested for group {} on channel {}", group, channel);

    match state.recorder.start(group, channel).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(StartResponse {
                status: "recording".to_string(),
                message: format!(
                    "Recording in: {} (ID {}). Use stop with the same ID to finish.",
                    receipt.channel_name, receipt.channel_id
                ),
                channel_id: receipt.channel_id,
                session_dir: receipt.session_dir.display().to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            let status = match &e {
                StartError::UnknownChannel | StartError::NotVoiceChannel => StatusCode::NOT_FOUND,
                StartError::AlreadyActive(_) => StatusCode::CONFLICT,
                StartError::Connect(_) => StatusCode::BAD_GATEWAY,
                StartError::SessionDir(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let message = match &e {
                StartError::UnknownChannel | StartError::NotVoiceChannel => {
                    "No voice channel found with that ID.".to_string()
                }
                _ => e.to_string(),
            };
            error_response(status, message)
        }
    }
}

/// POST /sessions/stop
/// Stop the recording bound to the given channel and save files
pub async fn stop_session(
    State(state): State<AppState>,
    Json(req): Json<StopRequest>,
) -> impl IntoResponse {
    let channel = match parse_channel_id(&req.channel_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let group = GroupId(req.group_id);

    info!("Stop requested for group {} on channel {}", group, channel);

    match state.recorder.stop(group, channel).await {
        Ok(summary) => {
            let message = stop_message(&summary);
            (
                StatusCode::OK,
                Json(StopResponse {
                    status: "stopped".to_string(),
                    message,
                    summary,
                }),
            )
                .into_response()
        }
        Err(StopError::Rejected(rejection)) => {
            use crate::session::StopRejection;
            let status = match rejection {
                StopRejection::NotRecording => StatusCode::NOT_FOUND,
                StopRejection::WrongChannel { .. } => StatusCode::CONFLICT,
            };
            error_response(status, rejection.to_string())
        }
        Err(StopError::Finalize(e)) => {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not finish recording: {e:#}"),
            )
        }
    }
}

fn stop_message(summary: &StopSummary) -> String {
    let mut message = format!(
        "Recording finished. Files saved in: {}",
        summary.session_dir.display()
    );
    if let Some(mix) = &summary.mix_path {
        if let Some(name) = mix.file_name() {
            message.push_str(&format!("\nMix: {}", name.to_string_lossy()));
        }
    }
    if let Some(zip) = &summary.archive_path {
        if let Some(name) = zip.file_name() {
            message.push_str(&format!("\nZIP: {}", name.to_string_lossy()));
        }
    }
    message
}

/// GET /sessions/:group_id
/// Status of the group's active session
pub async fn session_status(
    State(state): State<AppState>,
    Path(group_id): Path<u64>,
) -> impl IntoResponse {
    match state.recorder.status(GroupId(group_id)).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No active recording for this group."),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
