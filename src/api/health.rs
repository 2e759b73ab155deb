use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// Liveness check. Also reports whether dispatch can reach an Analyzer.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "analyzer_configured": state.dispatcher.is_configured(),
    }))
}
