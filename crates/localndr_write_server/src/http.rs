//! HTTP surface of the write server.

use crate::error::ServerError;
use crate::server::WriteServer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use localndr_protocol::ApplyChangesResponse;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The store behind the endpoints.
    pub server: Arc<WriteServer>,
}

/// Builds the router: `POST /apply-changes` plus a health probe.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/apply-changes", post(apply_changes))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn apply_changes(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ApplyChangesResponse>, ServerError> {
    let server = Arc::clone(&state.server);
    tokio::task::spawn_blocking(move || server.apply_changes_json(&body))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(Json(ApplyChangesResponse::ok()))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApplyChangesResponse::error(self.to_string()))).into_response()
    }
}
