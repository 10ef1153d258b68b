use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

pub mod webhook;

/// Build the application router. The webhook route is mounted at the
/// configured path, which is also the `path` the provider signs against.
pub fn router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path.clone();
    Router::new()
        .route("/health", get(health))
        .route(&webhook_path, post(webhook::receive_webhook))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_status = if state.db.is_some() {
        "connected"
    } else {
        "disconnected"
    };
    Json(serde_json::json!({ "ok": true, "db": db_status }))
}
