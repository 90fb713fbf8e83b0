//! Thin `axum` JSON shim over the [`crate::control::ControlSurface`] (C10,
//! SPEC_FULL.md §2, §4.8): binds the seven commands of spec.md §6.1 onto
//! HTTP routes. Routing/auth/TLS policy is explicitly out of scope
//! (spec.md §1) — this only exercises the Control Surface end to end.
//!
//! Grounded in the `onurtuna-OasisNvr` pack example's `src/api.rs`
//! (`AppState`, `build_router`, `CorsLayer::permissive()`, handlers
//! returning `(StatusCode, Json<...>)`), the closest analogue to "HTTP
//! surface over a recording manager" in the retrieval pack.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::control::ControlSurface;
use crate::error::ControllerError;
use crate::recording::StartRequest;

pub struct AppState {
    pub control: ControlSurface,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/recording/start", post(handle_start_recording))
        .route("/api/recording/stop", post(handle_stop_recording))
        .route("/api/preview/start", post(handle_start_preview))
        .route("/api/preview/stop", post(handle_stop_preview))
        .route("/api/preview/restart", post(handle_restart_preview))
        .route("/api/health", get(handle_recording_health))
        .route("/api/alerts", get(handle_alerts))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    info!(%addr, "control surface HTTP shim listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "failed to bind control surface HTTP listener");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "control surface HTTP server error");
    }
}

/// Maps a [`ControllerError`] onto the status code + stable error string
/// the UI dispatches on (spec.md §7 "user-visible failure behavior").
fn error_response(err: ControllerError) -> impl IntoResponse {
    let status = match &err {
        ControllerError::ProtectedStop { .. } => StatusCode::CONFLICT,
        ControllerError::AlreadyRecording { .. } => StatusCode::CONFLICT,
        ControllerError::NotRecording => StatusCode::CONFLICT,
        ControllerError::RecordingActive => StatusCode::CONFLICT,
        ControllerError::LockBusy { .. } => StatusCode::CONFLICT,
        ControllerError::StartFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ControllerError::ConfigInvalid { .. } | ControllerError::BadCrop { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string(), "cause": format!("{err:?}") })))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::to_value(state.control.get_status()).unwrap()))
}

#[derive(Debug, Deserialize)]
struct StartRecordingBody {
    match_id: Option<String>,
    #[serde(default)]
    force: bool,
    require_all_cameras: Option<bool>,
    recovery_max_attempts: Option<u32>,
}

async fn handle_start_recording(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartRecordingBody>,
) -> impl IntoResponse {
    let req = StartRequest {
        match_id: body.match_id,
        force: body.force,
        require_all_cameras: body.require_all_cameras,
        recovery_max_attempts: body.recovery_max_attempts,
    };
    match state.control.start_recording(req) {
        Ok(report) => (StatusCode::OK, Json(serde_json::to_value(report).unwrap())).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct StopRecordingBody {
    #[serde(default)]
    force: bool,
}

async fn handle_stop_recording(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StopRecordingBody>,
) -> impl IntoResponse {
    match state.control.stop_recording(body.force) {
        Ok(report) => (StatusCode::OK, Json(serde_json::to_value(report).unwrap())).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CameraIdBody {
    camera_id: Option<u8>,
}

async fn handle_start_preview(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CameraIdBody>,
) -> impl IntoResponse {
    match state.control.start_preview(body.camera_id) {
        Ok(report) => (StatusCode::OK, Json(serde_json::to_value(report).unwrap())).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn handle_stop_preview(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CameraIdBody>,
) -> impl IntoResponse {
    let report = state.control.stop_preview(body.camera_id);
    (StatusCode::OK, Json(serde_json::to_value(report).unwrap()))
}

async fn handle_restart_preview(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CameraIdBody>,
) -> impl IntoResponse {
    match state.control.restart_preview(body.camera_id) {
        Ok(report) => (StatusCode::OK, Json(serde_json::to_value(report).unwrap())).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn handle_recording_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::to_value(state.control.get_recording_health()).unwrap()))
}

#[derive(Debug, Deserialize)]
struct AlertsParams {
    max: Option<usize>,
}

async fn handle_alerts(State(state): State<Arc<AppState>>, Query(params): Query<AlertsParams>) -> impl IntoResponse {
    let max = params.max.unwrap_or(crate::constants::DEFAULT_ALERT_RING_CAPACITY);
    (StatusCode::OK, Json(serde_json::to_value(state.control.get_alerts(max)).unwrap()))
}
