use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("recipe_guard_requests_total", "Total number of requests").unwrap();
    pub static ref DECISIONS: IntCounterVec = register_int_counter_vec!(
        "recipe_guard_decisions_total",
        "Admission decisions by action and outcome",
        &["action", "outcome"]
    )
    .unwrap();
    pub static ref TRACKED_KEYS: IntGauge =
        register_int_gauge!("recipe_guard_tracked_keys", "Current number of rate limit windows").unwrap();
    pub static ref SWEPT_WINDOWS: IntCounter =
        register_int_counter!("recipe_guard_swept_windows_total", "Expired windows reclaimed").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "recipe_guard_upstream_latency_seconds",
        "Upstream round trip latency in seconds"
    )
    .unwrap();
}
