use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recipe_guard::config::Args;
use recipe_guard::handlers;
use recipe_guard::rate_limit::RateLimitStore;
use recipe_guard::reclaim::Reclaimer;
use recipe_guard::state::AppState;
use recipe_guard::upstream::{UpstreamPool, health_checker};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();
    init_tracing(args.log_json);

    let client = reqwest::Client::new();
    let upstreams = Arc::new(UpstreamPool::new(&args.upstreams)?);
    let store = Arc::new(RateLimitStore::with_system_clock());
    let state = Arc::new(AppState::new(
        client.clone(),
        Arc::clone(&upstreams),
        Arc::clone(&store),
        &args.limits,
    ));

    for limiter in state.limiters.iter() {
        let config = limiter.config();
        info!(
            action = %limiter.action(),
            window = ?config.window(),
            max_requests = config.max_requests(),
            "limiter configured"
        );
    }

    // window reclamation lives as long as the server
    let reclaimer = Reclaimer::start(Arc::clone(&store), args.sweep_interval());

    tokio::spawn(health_checker(
        upstreams,
        client,
        args.health_path.clone(),
        args.health_interval(),
    ));

    let app = handlers::router(state, args.max_body_bytes);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(port = args.port, upstreams = %args.upstreams, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    reclaimer.stop().await;
    Ok(())
}
