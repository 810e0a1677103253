//! HTTP server initialization and routing

use axum::{routing::get, Router};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::social::api::configure_social_routes;
use crate::social::SocialBackend;

use super::{health_check, health_check_simple, shutdown_signal};

pub fn build_router<S: SocialBackend>(app_state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(health_check_simple))
        .route("/api/health", get(health_check::<S>))
        .merge(configure_social_routes::<S>())
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn run_axum_server<S: SocialBackend>(
    app_state: Arc<AppState<S>>,
    host: &str,
    port: u16,
) -> std::io::Result<()> {
    let app = build_router(app_state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
