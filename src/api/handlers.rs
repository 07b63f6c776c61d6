use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{SignalKind, SourceClass};
use crate::scheduler::{Coordinator, CycleReport};
use crate::sink::{SignalFilter, SignalStore, StoredSignal, Subscription, WebhookRegistry};

/// Application state shared across handlers
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<dyn SignalStore>,
    pub registry: Arc<WebhookRegistry>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
pub struct RunParams {
    /// Limit the manual run to one source class
    pub source: Option<SourceClass>,
}

#[derive(Serialize)]
pub struct RunResponse {
    pub reports: Vec<CycleReport>,
}

/// Manual cycle trigger, the on-demand counterpart of the timers.
pub async fn run_cycles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunParams>,
) -> Result<Json<RunResponse>, ApiError> {
    let reports = match params.source {
        Some(class) => vec![state
            .coordinator
            .run_cycle(class)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?],
        None => state
            .coordinator
            .run_all()
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    };
    Ok(Json(RunResponse { reports }))
}

pub async fn list_signals(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SignalFilter>,
) -> Result<Json<Vec<StoredSignal>>, ApiError> {
    let signals = state
        .store
        .list(&filter)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(signals))
}

pub async fn list_webhooks(State(state): State<Arc<AppState>>) -> Json<Vec<Subscription>> {
    Json(state.registry.list())
}

#[derive(Deserialize)]
pub struct RegisterWebhookRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kinds: Option<Vec<SignalKind>>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

pub async fn register_webhook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterWebhookRequest>,
) -> Result<StatusCode, ApiError> {
    let mut subscription = Subscription::new(request.name, request.url);
    subscription.kinds = request.kinds;
    subscription.headers = request.headers;
    state
        .registry
        .register(subscription)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_webhook(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .registry
        .remove(&name)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no webhook named {name}")))
    }
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
