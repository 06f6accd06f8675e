//! HTTP routes of the shared listener.
//!
//! | Request                               | Response                       |
//! |---------------------------------------|--------------------------------|
//! | `GET /`                               | `200 {"status":"ok"}`          |
//! | `GET /initiate?token=<secret>`        | `200` [`InitiateResponse`]     |
//! | any path with `Upgrade: websocket`    | `101`, then a viewer session   |
//! | anything else                         | `404 {"status":"error",...}`   |
//!
//! Every response carries permissive CORS headers.

use std::sync::Arc;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use relay_core::protocol::http::{InitiateResponse, LivenessResponse};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::RelayService;
use crate::infrastructure::hub::ConnectionHub;
use crate::infrastructure::ws_server;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RelayService>,
    pub hub: Arc<ConnectionHub>,
}

/// Query string of `GET /initiate`.
#[derive(Debug, Default, Deserialize)]
pub struct InitiateQuery {
    #[serde(default)]
    pub token: String,
}

/// Builds the router for the relay listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/initiate", get(initiate))
        .fallback(fallback)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(ws: Option<WebSocketUpgrade>, State(state): State<AppState>) -> Response {
    match ws {
        Some(ws) => ws_server::upgrade(ws, state),
        None => Json(LivenessResponse::ok()).into_response(),
    }
}

async fn initiate(
    State(state): State<AppState>,
    Query(query): Query<InitiateQuery>,
) -> Json<InitiateResponse> {
    Json(state.service.initiate(&query.token).await)
}

/// Upgrades on any path; otherwise a JSON 404.
async fn fallback(ws: Option<WebSocketUpgrade>, State(state): State<AppState>) -> Response {
    match ws {
        Some(ws) => ws_server::upgrade(ws, state),
        None => (
            StatusCode::NOT_FOUND,
            Json(LivenessResponse::error("not found")),
        )
            .into_response(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
