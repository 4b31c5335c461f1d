//! Presence Routes
//!
//! - GET /api/v1/presence - Everyone online
//! - GET /api/v1/presence/:user_id - One user

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{OnlineResponse, PresenceResponse};
use crate::api::state::AppState;
use crate::hub::UserId;

/// GET /api/v1/presence
pub async fn list_online(State(state): State<Arc<AppState>>) -> Json<OnlineResponse> {
    let online = state.hub.list_online().await;
    let count = online.len();

    Json(OnlineResponse { online, count })
}

/// GET /api/v1/presence/:user_id
pub async fn user_presence(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        user_id,
        online: state.hub.is_online(user_id).await,
    })
}
