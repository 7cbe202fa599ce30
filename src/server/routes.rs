//! HTTP routes
//!
//! | Path | Description |
//! |------|-------------|
//! | `POST /api/camera/stream` | Camera upload of one JPEG frame |
//! | `GET /api/camera/status` | Liveness probe |
//! | `GET /api/camera/latest` | Current frame as `image/jpeg` (204 when none or stale) |
//! | `GET /api/camera/stats` | Relay counters |
//! | `GET /cameraHub` | WebSocket viewer feed |
//!
//! Uploads are authenticated from the request headers before the body is read.
//!
//! `/cameraHub` keeps the original hub path, but it is a plain WebSocket that
//! sends one bare frame payload per message (base64 text or raw binary). It does
//! not speak the SignalR hub protocol, so SignalR clients cannot use it.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State, WebSocketUpgrade};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::relay::{Relay, RelayError};
use crate::stats::RelayStatsSnapshot;

use super::auth::UploadAuth;
use super::config::ServerConfig;
use super::viewer::serve_viewer;

/// Shared state passed to all request handlers
#[derive(Clone)]
pub(super) struct AppState {
    pub(super) relay: Arc<Relay>,
    pub(super) auth: Arc<UploadAuth>,
    pub(super) send_timeout: Duration,
}

/// Ingest failures, reported to the uploading camera
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or wrong upload token
    #[error("Unauthorized")]
    Unauthorized,
    /// Zero-length request body
    #[error("No data received")]
    EmptyBody,
    /// Frame rejected by the relay
    #[error(transparent)]
    Rejected(#[from] RelayError),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
            IngestError::EmptyBody => StatusCode::BAD_REQUEST,
            IngestError::Rejected(RelayError::FrameTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            IngestError::Rejected(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    size: usize,
    sequence: u64,
    viewers: usize,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: RelayStatsSnapshot,
    subscribers: usize,
    stale: bool,
}

/// Build the router for a relay
pub(super) fn router(relay: Arc<Relay>, config: &ServerConfig) -> Router {
    let auth = match &config.auth_token {
        Some(token) => UploadAuth::Token(token.clone()),
        None => UploadAuth::Disabled,
    };
    let state = AppState {
        relay,
        auth: Arc::new(auth),
        send_timeout: config.send_timeout,
    };

    let mut app = Router::new()
        .route(
            "/api/camera/stream",
            post(receive_frame)
                .layer(DefaultBodyLimit::max(config.relay.max_frame_size))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_upload_token,
                )),
        )
        .route("/api/camera/status", get(status))
        .route("/api/camera/latest", get(latest_frame))
        .route("/api/camera/stats", get(stats))
        .route("/cameraHub", get(viewer_socket))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors_any_origin {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// Reject uploads without a valid token before their body is read
async fn require_upload_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, IngestError> {
    if !state.auth.check(request.headers()) {
        tracing::warn!("Rejected upload with missing or invalid token");
        return Err(IngestError::Unauthorized);
    }

    Ok(next.run(request).await)
}

async fn receive_frame(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    if body.is_empty() {
        tracing::warn!("Received empty stream data");
        state.relay.stats().record_rejected();
        return Err(IngestError::EmptyBody);
    }

    let size = body.len();
    let report = state.relay.ingest(body)?;

    Ok(Json(IngestResponse {
        status: "received",
        size,
        sequence: report.sequence,
        viewers: report.delivered,
    }))
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online",
        timestamp: Utc::now(),
    })
}

async fn latest_frame(State(state): State<AppState>) -> Response {
    match state.relay.snapshot() {
        Some(frame) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            frame.data().clone(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.relay.stats().snapshot(),
        subscribers: state.relay.broadcaster().subscriber_count(),
        stale: state.relay.store().is_stale(),
    })
}

async fn viewer_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_viewer(socket, state))
}
