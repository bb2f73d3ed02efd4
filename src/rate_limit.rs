//! Fixed-window request counting.
//!
//! Each key gets `max_requests` admissions per window. A window starts on the
//! first request after the previous one ended and lasts exactly the configured
//! duration; it is never extended. Up to twice the quota can therefore land
//! around a window boundary.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client_key::{HeaderSource, client_key};
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::limits::{Action, LimiterConfig};
use crate::metrics::DECISIONS;

// Rate limit entry - tracks requests per action/client key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: Timestamp,
}

impl RateWindow {
    fn start(now: Timestamp, config: &LimiterConfig) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(config.window_millis()),
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub admitted: bool,
    pub remaining: u32,
    pub limit: u32,
    /// End of the current window, ms since the Unix epoch.
    pub reset_time: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now: Timestamp) -> u64 {
        self.reset_time.saturating_sub(now).div_ceil(1000).max(1)
    }
}

/// Counter map shared by every limiter.
///
/// `check_key` runs under the shard lock of its key, so concurrent checks on
/// one key never admit more than the quota.
pub struct RateLimitStore {
    windows: DashMap<String, RateWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimitStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    /// Number of tracked keys, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn window(&self, key: &str) -> Option<RateWindow> {
        self.windows.get(key).map(|w| *w)
    }

    /// Count one attempt for `key` and decide whether to admit it.
    pub fn check_key(&self, key: &str, config: &LimiterConfig) -> Decision {
        let now = self.clock.now_millis();
        let limit = config.max_requests();

        let admit = |remaining, reset_time| Decision {
            admitted: true,
            remaining,
            limit,
            reset_time,
            reason: None,
        };

        match self.windows.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let window = RateWindow::start(now, config);
                slot.insert(window);
                admit(limit - 1, window.reset_at)
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();

                // window expired..? start a fresh one
                if window.reset_at <= now {
                    *window = RateWindow::start(now, config);
                    return admit(limit - 1, window.reset_at);
                }

                if window.count < limit {
                    window.count += 1;
                    return admit(limit - window.count, window.reset_at);
                }

                let retry_secs = window.reset_at.saturating_sub(now).div_ceil(1000).max(1);
                Decision {
                    admitted: false,
                    remaining: 0,
                    limit,
                    reset_time: window.reset_at,
                    reason: Some(format!(
                        "Too many requests. Try again in {} seconds.",
                        retry_secs
                    )),
                }
            }
        }
    }

    /// Drop every window that has already ended. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0;
        self.windows.retain(|_, window| {
            let live = window.reset_at > now;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }
}

pub type KeyFn = Arc<dyn Fn(&dyn HeaderSource) -> String + Send + Sync>;

/// A named limiter: quota plus key derivation, counting into a shared store.
#[derive(Clone)]
pub struct RateLimiter {
    action: Action,
    config: LimiterConfig,
    key_fn: KeyFn,
    store: Arc<RateLimitStore>,
}

impl RateLimiter {
    /// Keys are `<action>:<client ip>`.
    pub fn new(action: Action, config: LimiterConfig, store: Arc<RateLimitStore>) -> Self {
        let key_fn: KeyFn =
            Arc::new(move |headers: &dyn HeaderSource| client_key(action.as_str(), headers));
        Self::with_key_fn(action, config, store, key_fn)
    }

    pub fn with_key_fn(
        action: Action,
        config: LimiterConfig,
        store: Arc<RateLimitStore>,
        key_fn: KeyFn,
    ) -> Self {
        Self {
            action,
            config,
            key_fn,
            store,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    pub fn check<H: HeaderSource>(&self, request: &H) -> Decision {
        let key = (self.key_fn)(request);
        let decision = self.store.check_key(&key, &self.config);

        if decision.admitted {
            DECISIONS
                .with_label_values(&[self.action.as_str(), "admitted"])
                .inc();
            debug!(action = %self.action, key = %key, remaining = decision.remaining, "admitted");
        } else {
            DECISIONS
                .with_label_values(&[self.action.as_str(), "rejected"])
                .inc();
            warn!(action = %self.action, key = %key, reset_time = decision.reset_time, "rate limit exceeded");
        }
        decision
    }
}
