//! Fixed-window rate limiting for the recipe app's mutation endpoints,
//! plus the HTTP gateway that applies it in front of the app.

pub mod client_key;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod metrics;
pub mod rate_limit;
pub mod reclaim;
pub mod state;
pub mod upstream;

pub use client_key::{HeaderSource, client_ip, client_key};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::{ConfigError, GatewayError};
pub use limits::{Action, LimitOverride, LimiterConfig, LimiterRegistry};
pub use rate_limit::{Decision, RateLimitStore, RateLimiter, RateWindow};
pub use reclaim::Reclaimer;
