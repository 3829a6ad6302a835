//! Dispatch front door: `GET /simple`, `GET /fanout` and `GET /hedged` answer with the
//! payload of whichever replica won under that strategy.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hedged_requests::{router, DispatchConfig, Dispatcher, ReplicaEndpoint};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dispatcher")]
struct Cli {
    #[arg(long, env = "DISPATCHER_PORT", default_value = "8080")]
    port: u16,
    /// Replica URL; repeat for each replica, in hedging order.
    #[arg(
        long = "replica",
        env = "DISPATCHER_REPLICAS",
        value_delimiter = ',',
        default_values_t = [
            "http://localhost:8090/ishealthy".to_string(),
            "http://localhost:8091/ishealthy".to_string(),
            "http://localhost:8092/ishealthy".to_string(),
        ]
    )]
    replicas: Vec<String>,
    /// Hedging stagger; measure the replicas' p99 first (see the strategy_race demo).
    #[arg(long, env = "DISPATCHER_STAGGER_MS", default_value = "16")]
    stagger_ms: u64,
    #[arg(long, env = "DISPATCHER_TIMEOUT_MS", default_value = "2000")]
    timeout_ms: u64,
    #[arg(long, default_value = "1000")]
    attempt_timeout_ms: u64,
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

    if cli.replicas.is_empty() {
        anyhow::bail!("at least one --replica is required");
    }
    if cli.stagger_ms == 0 {
        anyhow::bail!("--stagger-ms must be positive");
    }

    let replicas: Vec<ReplicaEndpoint> = cli
        .replicas
        .iter()
        .map(|url| ReplicaEndpoint::from_url(url.as_str()))
        .collect();

    let cfg = DispatchConfig::from_p99(replicas, Duration::from_millis(cli.stagger_ms))
        .with_overall_timeout(Duration::from_millis(cli.timeout_ms))
        .with_attempt_timeout(Duration::from_millis(cli.attempt_timeout_ms));

    tracing::info!(
        replicas = cfg.replicas.len(),
        stagger_ms = cli.stagger_ms,
        timeout_ms = cli.timeout_ms,
        "dispatcher configured"
    );

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(port = cli.port, "dispatcher listening");

    axum::serve(listener, router::router(Dispatcher::new(cfg)))
        .await
        .context("dispatcher server failed")
}
