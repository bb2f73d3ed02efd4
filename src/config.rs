use clap::Parser;
use std::time::Duration;

use crate::limits::LimitOverride;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "recipe-guard")]
#[command(about = "Rate limiting gateway for the recipe app's mutation endpoints")]
pub struct Args {
    // Port to run the gateway on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Recipe app instances (comma-separated)
    // Example: "localhost:3000,localhost:3001"
    #[arg(short, long, default_value = "localhost:3000")]
    pub upstreams: String,

    // Path probed on every upstream by the health checker
    #[arg(long, default_value = "/")]
    pub health_path: String,

    // Health check interval in seconds
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,

    // Expired window sweep interval in seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Largest request body forwarded (image uploads included)
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,

    // Quota override, repeatable: --limit like=10:5
    #[arg(long = "limit", value_name = "ACTION=SECS:MAX")]
    pub limits: Vec<LimitOverride>,

    // Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }
}
