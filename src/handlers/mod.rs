mod health;
mod metrics;
mod proxy;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;

use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use proxy::{guarded_action, proxy_handler};

// Gateway routes; everything not listed here goes to the recipe app
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_handler)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
