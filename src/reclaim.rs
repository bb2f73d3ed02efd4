//! Background sweep of expired rate limit windows.
//!
//! `check` already treats an expired window as absent, so the sweep only
//! bounds memory. It has to run for as long as the store takes traffic.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::metrics::{SWEPT_WINDOWS, TRACKED_KEYS};
use crate::rate_limit::RateLimitStore;

/// Handle to a running sweep task. Dropping it aborts the task.
pub struct Reclaimer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reclaimer {
    /// Spawn the sweep on the current tokio runtime.
    pub fn start(store: Arc<RateLimitStore>, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?every, "rate limit reclamation started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        SWEPT_WINDOWS.inc_by(removed as u64);
                        TRACKED_KEYS.set(store.len() as i64);
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "swept expired windows");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            info!("rate limit reclamation stopped");
        });

        Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "reclamation task ended abnormally");
            }
        }
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
