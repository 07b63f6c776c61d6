use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_check, list_signals, list_webhooks, register_webhook, remove_webhook, run_cycles,
    AppState,
};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Manual cycle trigger
        .route("/run", post(run_cycles))
        // Signal stream (read-only)
        .route("/signals", get(list_signals))
        // Webhook registry
        .route("/webhooks", get(list_webhooks))
        .route("/webhooks", post(register_webhook))
        .route("/webhooks/:name", delete(remove_webhook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(
    state: Arc<AppState>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("API listening on http://{addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
