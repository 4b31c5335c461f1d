//! Event Routes
//!
//! Endpoints backend services use to push events to connected users.
//!
//! - POST /api/v1/events - Fan out to a recipient list
//! - POST /api/v1/users/:user_id/events - Send to one user

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DirectRequest, PublishRequest, PublishResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::hub::{FanoutRequest, HubError, UserId};

/// POST /api/v1/events
///
/// Queue an event for every listed recipient. Offline recipients are skipped
/// silently, so 202 only means the hub accepted the request.
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PublishRequest>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    if req.recipients.is_empty() {
        return Err(ApiError::Validation("No recipients".to_string()));
    }

    let max_recipients = state.config.server.max_publish_recipients;
    if req.recipients.len() > max_recipients {
        return Err(ApiError::Validation(format!(
            "Recipient count exceeds maximum of {}",
            max_recipients
        )));
    }

    let request = build_request(req.recipients, req.kind, &req.payload)?;
    let recipients = request.recipients().len();
    state.hub.submit(request).await?;

    Ok(accepted(recipients))
}

/// POST /api/v1/users/:user_id/events
///
/// Best-effort delivery to a single user.
pub async fn send_to_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<DirectRequest>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    let request = build_request([user_id], req.kind, &req.payload)?;
    state.hub.submit(request).await?;

    Ok(accepted(1))
}

fn build_request(
    recipients: impl IntoIterator<Item = UserId>,
    kind: Option<String>,
    payload: &serde_json::Value,
) -> ApiResult<FanoutRequest> {
    let bytes = serde_json::to_vec(payload).map_err(HubError::from)?;
    let request = FanoutRequest::new(recipients, bytes);

    Ok(match kind {
        Some(kind) => request.kind(kind),
        None => request,
    })
}

fn accepted(recipients: usize) -> (StatusCode, Json<PublishResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(PublishResponse {
            status: "accepted".to_string(),
            recipients,
        }),
    )
}
