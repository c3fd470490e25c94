//! Collector routes — tab report intake and the latest snapshot.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::state::CollectorState;

/// Build the collector router.
pub fn build_router(state: Arc<CollectorState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", post(receive_tabs))
        .route("/latest", get(latest_tabs))
        .fallback(not_found)
        // Tab lists with inline favicons easily exceed the 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the collector on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<CollectorState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

// ---------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------

async fn receive_tabs(
    State(state): State<Arc<CollectorState>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejected tab info: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON" })),
            );
        }
    };

    match payload.as_array() {
        Some(tabs) => info!("Received tab info: {} tabs", tabs.len()),
        None => info!("Received tab info (non-array payload)"),
    }

    if let Err(e) = state.record(payload).await {
        error!("Failed to write {}: {}", state.log_path().display(), e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "message": format!(
                "Tab info received and written to {}",
                state.log_path().display()
            )
        })),
    )
}

async fn latest_tabs(State(state): State<Arc<CollectorState>>) -> (StatusCode, Json<Value>) {
    match state.latest() {
        Some(latest) => (StatusCode::OK, Json(latest)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No tab info received yet" })),
        ),
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
