//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::social::SocialBackend;

pub async fn health_check<S: SocialBackend>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = state.backend().is_available().await;

    let status = if db_ok { "healthy" } else { "degraded" };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "socialserver",
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_ok
        })),
    )
}

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "socialserver",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
