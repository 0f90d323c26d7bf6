//! HTTP route definitions

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Path of the lobby WebSocket endpoint
pub const WS_PATH: &str = "/ws";

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(WS_PATH, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connections: usize,
    ready: usize,
    in_game: usize,
}

async fn health_handler(State(state): State<AppState>) -> Response {
    match state.lobby.snapshot().await {
        Ok(snapshot) => Json(HealthResponse {
            status: "ok",
            uptime_secs: uptime_secs(),
            connections: snapshot.connections(),
            ready: snapshot.ready(),
            in_game: snapshot.in_game(),
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            let body = serde_json::json!({ "status": "unavailable" });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::game::{BotRoster, Duel};
    use crate::lobby::{ConnHandle, Dispatcher};

    #[tokio::test]
    async fn test_health_reports_lobby_counts() {
        let (dispatcher, lobby) = Dispatcher::new(Arc::new(Duel::new(100)), BotRoster::builtin());
        tokio::spawn(dispatcher.run());

        let (handle, _pumps) = ConnHandle::pair();
        lobby.register(handle).await.unwrap();

        let router = build_router(AppState::new(lobby));
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 1);
        assert_eq!(json["in_game"], 0);
    }

    #[tokio::test]
    async fn test_ws_route_rejects_plain_get() {
        let (dispatcher, lobby) = Dispatcher::new(Arc::new(Duel::new(100)), BotRoster::builtin());
        tokio::spawn(dispatcher.run());

        let router = build_router(AppState::new(lobby));
        let response = router
            .oneshot(Request::builder().uri(WS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
