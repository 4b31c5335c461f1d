//! Chathub HTTP API
//!
//! HTTP layer for the connection hub, built with Axum.
//!
//! # Endpoints
//!
//! ## Events
//! - `POST /api/v1/events` - Fan out an event to a list of users
//! - `POST /api/v1/users/:user_id/events` - Send an event to one user
//!
//! ## Presence
//! - `GET /api/v1/presence` - List online users
//! - `GET /api/v1/presence/:user_id` - Check one user
//!
//! ## Health
//! - `GET /health/live` - Liveness check
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /ws?user_id=N` - Real-time connection for a user
//!
//! # Example
//!
//! ```rust,no_run
//! use chathub::api::{serve, AppState};
//! use chathub::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(Config::default());
//!     serve(state).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Producer routes
        .route("/events", post(routes::events::publish))
        .route("/users/:user_id/events", post(routes::events::send_to_user))
        // Presence routes
        .route("/presence", get(routes::presence::list_online))
        .route("/presence/:user_id", get(routes::presence::user_presence));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the HTTP server and run until a shutdown signal arrives
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.bind_addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Chathub listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Chathub shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hub::{Hub, Outbox, Payload, UserId};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Hub) {
        let state = AppState::new(Config::default());
        let hub = state.hub.clone();
        (build_router(state), hub)
    }

    async fn connect(hub: &Hub, user_id: UserId) -> Outbox {
        let mut events = hub.subscribe_presence();
        let (handle, outbox) = hub.connect(user_id);
        hub.register(handle).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        outbox
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _hub) = create_test_app();

        let response = app.oneshot(get("/health/live")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, hub) = create_test_app();
        let _outbox = connect(&hub, 1).await;

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 1);
        assert_eq!(body["hub"]["registered"], 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_connected_user() {
        let (app, hub) = create_test_app();
        let mut outbox = connect(&hub, 7).await;

        let response = app
            .oneshot(post_json(
                "/api/v1/events",
                r#"{"recipients": [7, 8, 7], "kind": "message.new", "payload": {"id": 1}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["recipients"], 2);

        let payload = tokio::time::timeout(Duration::from_secs(5), outbox.recv())
            .await
            .unwrap();
        assert_eq!(payload, Some(Payload::from(r#"{"id":1}"#)));
    }

    #[tokio::test]
    async fn test_publish_empty_recipients() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(post_json(
                "/api/v1/events",
                r#"{"recipients": [], "payload": {}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_publish_recipient_cap_from_config() {
        let mut config = Config::default();
        config.server.max_publish_recipients = 2;
        let app = build_router(AppState::new(config));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/events",
                r#"{"recipients": [1, 2, 3], "payload": {}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let response = app
            .oneshot(post_json(
                "/api/v1/events",
                r#"{"recipients": [1, 2], "payload": {}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_publish_invalid_json() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(post_json("/api/v1/events", "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_to_offline_user_accepted() {
        let (app, _hub) = create_test_app();

        let response = app
            .oneshot(post_json(
                "/api/v1/users/404/events",
                r#"{"payload": "hello"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_presence_routes() {
        let (app, hub) = create_test_app();
        let _a = connect(&hub, 3).await;
        let _b = connect(&hub, 1).await;

        let response = app.clone().oneshot(get("/api/v1/presence")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["online"], serde_json::json!([1, 3]));
        assert_eq!(body["count"], 2);

        let response = app.clone().oneshot(get("/api/v1/presence/3")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["online"], true);

        let response = app.oneshot(get("/api/v1/presence/9")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["user_id"], 9);
        assert_eq!(body["online"], false);
    }
}
