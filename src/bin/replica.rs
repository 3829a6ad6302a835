//! Simulated replica: answers `GET /ishealthy` after a baseline delay, with a small
//! share of requests landing in a much slower tail.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use clap::Parser;
use hedged_requests::replica::{self, LatencyModel, SeededLatency};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "replica")]
struct Cli {
    #[arg(long, env = "REPLICA_PORT", default_value = "8090")]
    port: u16,
    /// Seed for the latency generator; defaults to the current time.
    #[arg(long, env = "REPLICA_SEED")]
    seed: Option<u64>,
    #[arg(long, default_value = "15")]
    baseline_ms: u64,
    #[arg(long, default_value = "100")]
    tail_ms: u64,
    #[arg(long, default_value = "3")]
    tail_percent: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let seed = cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    });
    let model = LatencyModel {
        baseline: Duration::from_millis(cli.baseline_ms),
        tail_extra: Duration::from_millis(cli.tail_ms),
        tail_percent: cli.tail_percent.min(100),
    };

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        port = cli.port,
        seed,
        baseline_ms = cli.baseline_ms,
        tail_ms = cli.tail_ms,
        tail_percent = model.tail_percent,
        "replica listening"
    );

    replica::serve(listener, Arc::new(SeededLatency::new(model, seed)))
        .await
        .context("replica server failed")
}
