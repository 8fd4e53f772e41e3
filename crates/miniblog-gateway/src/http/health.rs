use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, returns server metadata and fan-out counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = if state.live.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "group": state.live.dispatcher().group(),
        "subscribers": state.live.subscriber_count().await,
        "dispatch": state.live.dispatcher().stats(),
    }))
}
