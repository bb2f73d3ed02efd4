use std::sync::Arc;

use crate::limits::{LimitOverride, LimiterRegistry};
use crate::rate_limit::RateLimitStore;
use crate::upstream::UpstreamPool;

// app's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub upstreams: Arc<UpstreamPool>,
    pub store: Arc<RateLimitStore>, // every limiter counts here
    pub limiters: LimiterRegistry,
}

impl AppState {
    pub fn new(
        client: reqwest::Client,
        upstreams: Arc<UpstreamPool>,
        store: Arc<RateLimitStore>,
        overrides: &[LimitOverride],
    ) -> Self {
        let limiters = LimiterRegistry::with_overrides(Arc::clone(&store), overrides);
        Self {
            client,
            upstreams,
            store,
            limiters,
        }
    }
}
