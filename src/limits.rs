//! Named limiters and their quotas.
//!
//! | Action          | Window | Max requests |
//! |-----------------|--------|--------------|
//! | `recipe-create` | 60 s   | 2            |
//! | `recipe-update` | 30 s   | 3            |
//! | `like`          | 10 s   | 5            |
//! | `comment`       | 30 s   | 3            |
//! | `image-upload`  | 60 s   | 1            |

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::{RateLimitStore, RateLimiter};

/// A mutation the recipe app throttles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    RecipeCreate,
    RecipeUpdate,
    Like,
    Comment,
    ImageUpload,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::RecipeCreate,
        Action::RecipeUpdate,
        Action::Like,
        Action::Comment,
        Action::ImageUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RecipeCreate => "recipe-create",
            Action::RecipeUpdate => "recipe-update",
            Action::Like => "like",
            Action::Comment => "comment",
            Action::ImageUpload => "image-upload",
        }
    }

    pub fn default_config(&self) -> LimiterConfig {
        let (secs, max) = match self {
            Action::RecipeCreate => (60, 2),
            Action::RecipeUpdate => (30, 3),
            Action::Like => (10, 5),
            Action::Comment => (30, 3),
            Action::ImageUpload => (60, 1),
        };
        LimiterConfig {
            window: Duration::from_secs(secs),
            max_requests: max,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownAction(s.to_string()))
    }
}

/// Window length and quota of one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    window: Duration,
    max_requests: u32,
}

impl LimiterConfig {
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, ConfigError> {
        if window.as_millis() == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if u64::try_from(window.as_millis()).is_err() {
            return Err(ConfigError::WindowTooLong);
        }
        if max_requests == 0 {
            return Err(ConfigError::ZeroQuota);
        }
        Ok(Self {
            window,
            max_requests,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_millis(&self) -> u64 {
        // bounded to u64 at construction
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

/// `--limit` argument: `<action>=<window_secs>:<max_requests>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOverride {
    pub action: Action,
    pub config: LimiterConfig,
}

impl FromStr for LimitOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidLimit(s.to_string());

        let (action, quota) = s.split_once('=').ok_or_else(invalid)?;
        let (secs, max) = quota.split_once(':').ok_or_else(invalid)?;
        let secs: u64 = secs.trim().parse().map_err(|_| invalid())?;
        let max: u32 = max.trim().parse().map_err(|_| invalid())?;

        Ok(Self {
            action: action.trim().parse()?,
            config: LimiterConfig::new(Duration::from_secs(secs), max)?,
        })
    }
}

/// One limiter per [`Action`], all counting into the same store.
pub struct LimiterRegistry {
    limiters: HashMap<Action, RateLimiter>,
}

impl LimiterRegistry {
    pub fn new(store: Arc<RateLimitStore>) -> Self {
        Self::with_overrides(store, &[])
    }

    // Later overrides for the same action win
    pub fn with_overrides(store: Arc<RateLimitStore>, overrides: &[LimitOverride]) -> Self {
        let limiters = Action::ALL
            .into_iter()
            .map(|action| {
                let config = overrides
                    .iter()
                    .rev()
                    .find(|o| o.action == action)
                    .map(|o| o.config)
                    .unwrap_or_else(|| action.default_config());
                (action, RateLimiter::new(action, config, Arc::clone(&store)))
            })
            .collect();
        Self { limiters }
    }

    pub fn get(&self, action: Action) -> &RateLimiter {
        // every action is registered at construction
        &self.limiters[&action]
    }

    pub fn by_name(&self, name: &str) -> Option<&RateLimiter> {
        name.parse::<Action>().ok().map(|a| self.get(a))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RateLimiter> {
        Action::ALL.into_iter().map(|a| self.get(a))
    }
}
