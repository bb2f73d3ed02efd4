use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use crate::error::ConfigError;

// Single instance of the recipe app
pub struct Upstream {
    pub url: String,
    healthy: AtomicBool,
}

impl Upstream {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

// Round-robin pool over the app instances
pub struct UpstreamPool {
    upstreams: Vec<Arc<Upstream>>,
    current: AtomicUsize,
}

impl UpstreamPool {
    // From comma-separated hosts: "localhost:3000, localhost:3001"
    pub fn new(upstreams_str: &str) -> Result<Self, ConfigError> {
        let upstreams: Vec<Arc<Upstream>> = upstreams_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let full_url = if url.starts_with("http") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", url.trim_end_matches('/'))
                };
                Arc::new(Upstream::new(full_url))
            })
            .collect();
        if upstreams.is_empty() {
            return Err(ConfigError::NoUpstreams);
        }

        for (i, u) in upstreams.iter().enumerate() {
            info!(index = i + 1, url = %u.url, "upstream registered");
        }

        Ok(Self {
            upstreams,
            current: AtomicUsize::new(0),
        })
    }

    // Next healthy upstream (round-robin)
    pub fn pick(&self) -> Option<Arc<Upstream>> {
        let len = self.upstreams.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        (0..len)
            .map(|i| &self.upstreams[(start + i) % len])
            .find(|u| u.is_healthy())
            .cloned()
    }

    pub fn all(&self) -> &[Arc<Upstream>] {
        &self.upstreams
    }

    pub fn healthy_count(&self) -> usize {
        self.upstreams.iter().filter(|u| u.is_healthy()).count()
    }
}

// Health check loop - runs every `check_interval`
pub async fn health_checker(
    pool: Arc<UpstreamPool>,
    client: reqwest::Client,
    health_path: String,
    check_interval: Duration,
) {
    let mut interval = interval(check_interval);

    info!(interval = ?check_interval, path = %health_path, "health checker started");

    loop {
        interval.tick().await;

        for upstream in pool.all() {
            let url = format!("{}{}", upstream.url, health_path);
            let was_healthy = upstream.is_healthy();

            let is_healthy = match client.get(&url).timeout(Duration::from_secs(5)).send().await {
                Ok(res) => res.status().is_success(),
                Err(_) => false,
            };
            upstream.set_healthy(is_healthy);

            // Log status changes only
            if was_healthy != is_healthy {
                if is_healthy {
                    info!(url = %upstream.url, "upstream is now healthy");
                } else {
                    warn!(url = %upstream.url, "upstream is now unhealthy");
                }
            }
        }
    }
}
