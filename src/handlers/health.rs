use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

// GET /health - the gateway itself is up; upstream state is informational
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "upstreams": {
            "healthy": state.upstreams.healthy_count(),
            "total": state.upstreams.all().len(),
        },
        "trackedKeys": state.store.len(),
    }))
}
