//! Gateway error types

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::limits::Action;
use crate::rate_limit::Decision;

/// Bad startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid limit '{0}', expected <action>=<window_secs>:<max_requests>")]
    InvalidLimit(String),

    #[error("limiter window must be longer than zero")]
    ZeroWindow,

    #[error("limiter window is too long to count in milliseconds")]
    WindowTooLong,

    #[error("limiter quota must allow at least one request")]
    ZeroQuota,

    #[error("at least one upstream is required")]
    NoUpstreams,
}

/// Errors answered to a client instead of the upstream response
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded for {action}")]
    RateLimited {
        action: Action,
        decision: Decision,
        retry_after_secs: u64,
    },

    #[error("no healthy upstream available")]
    NoHealthyUpstream,

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// `X-RateLimit-*` headers describing a decision.
pub fn rate_limit_headers(decision: &Decision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(decision.reset_time.div_ceil(1000)),
    );
    headers
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::RateLimited {
                action,
                decision,
                retry_after_secs,
            } => {
                let mut headers = rate_limit_headers(decision);
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
                let message = decision
                    .reason
                    .clone()
                    .unwrap_or_else(|| self.to_string());
                let body = Json(json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": message,
                        "action": action,
                    },
                    "remaining": decision.remaining,
                    "resetTime": decision.reset_time,
                }));
                return (StatusCode::TOO_MANY_REQUESTS, headers, body).into_response();
            }
            GatewayError::NoHealthyUpstream => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NO_HEALTHY_UPSTREAM",
                self.to_string(),
            ),
            GatewayError::Upstream(_) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILED", self.to_string())
            }
            GatewayError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
