//! Guarded forwarding to the recipe app.
//!
//! | Method           | Path                         | Limiter         |
//! |------------------|------------------------------|-----------------|
//! | `POST`           | `/api/recipes`               | `recipe-create` |
//! | `PUT`, `PATCH`   | `/api/recipes/{id}`          | `recipe-update` |
//! | `POST`, `DELETE` | `/api/recipes/{id}/like`     | `like`          |
//! | `POST`           | `/api/recipes/{id}/comments` | `comment`       |
//! | `POST`           | `/api/upload`                | `image-upload`  |
//!
//! Anything else is forwarded without a check.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult, rate_limit_headers};
use crate::limits::Action;
use crate::metrics::{REQUEST_TOTAL, UPSTREAM_LATENCY};
use crate::state::AppState;

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Limiter guarding `method path`, if any.
pub fn guarded_action(method: &Method, path: &str) -> Option<Action> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["api", "recipes"]) => Some(Action::RecipeCreate),
        ("PUT" | "PATCH", ["api", "recipes", _]) => Some(Action::RecipeUpdate),
        ("POST" | "DELETE", ["api", "recipes", _, "like"]) => Some(Action::Like),
        ("POST", ["api", "recipes", _, "comments"]) => Some(Action::Comment),
        ("POST", ["api", "upload"]) => Some(Action::ImageUpload),
        _ => None,
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<Response> {
    REQUEST_TOTAL.inc();

    let decision = match guarded_action(&method, uri.path()) {
        Some(action) => {
            let decision = state.limiters.get(action).check(&headers);
            if !decision.admitted {
                let retry_after_secs = decision.retry_after_secs(state.store.now());
                return Err(GatewayError::RateLimited {
                    action,
                    decision,
                    retry_after_secs,
                });
            }
            Some(decision)
        }
        None => None,
    };

    let mut response = forward(&state, method, &uri, headers, body).await?;
    if let Some(decision) = decision {
        response.headers_mut().extend(rate_limit_headers(&decision));
    }
    Ok(response)
}

async fn forward(
    state: &AppState,
    method: Method,
    uri: &Uri,
    mut headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<Response> {
    let upstream = state
        .upstreams
        .pick()
        .ok_or(GatewayError::NoHealthyUpstream)?;

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = format!("{}{}", upstream.url, path_and_query);

    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    debug!(%method, %url, "forwarding");
    let start_time = Instant::now();

    let res = match state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(res) => res,
        // Marking upstream as unhealthy until the next health check
        Err(e) => {
            upstream.set_healthy(false);
            warn!(url = %upstream.url, error = %e, "upstream failed, marked unhealthy");
            return Err(e.into());
        }
    };

    let status = res.status();
    let mut res_headers = res.headers().clone();
    strip_hop_by_hop(&mut res_headers);
    let bytes = match res.bytes().await {
        Ok(bytes) => bytes,
        // body cut off mid-read counts as a failed forward too
        Err(e) => {
            upstream.set_healthy(false);
            warn!(url = %upstream.url, error = %e, "upstream body failed, marked unhealthy");
            return Err(e.into());
        }
    };

    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok((status, res_headers, bytes).into_response())
}
