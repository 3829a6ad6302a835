//! Load test comparing simple, fanout and hedged dispatch.
//!
//! Fires a number of calls per strategy with bounded concurrency and prints the
//! latency distribution of each. With `--calibrate` it instead measures the p99 of a
//! single replica, which is the value the hedging stagger delay should be set to.
//!
//! By default three seeded replicas are started in-process; pass `--replica` (or set
//! `HEDGE_REPLICA_URLS`) to target running ones instead.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use clap::Parser;
use hedged_requests::{
    replica::{self, LatencyModel, SeededLatency},
    DispatchConfig, Dispatcher, LatencyRecorder, ReplicaEndpoint, Strategy,
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, Semaphore},
};

#[derive(Parser)]
struct Cli {
    /// Calls per strategy.
    #[arg(long, default_value = "2000")]
    calls: usize,
    #[arg(long, default_value = "64", value_parser = clap::value_parser!(u64).range(1..))]
    max_in_flight: u64,
    #[arg(long, default_value = "16")]
    stagger_ms: u64,
    /// Only measure single-replica latency and suggest a stagger delay.
    #[arg(long)]
    calibrate: bool,
    #[arg(long = "replica", env = "HEDGE_REPLICA_URLS", value_delimiter = ',')]
    replicas: Vec<String>,
}

#[derive(Debug)]
enum CallOutcome {
    Ok { latency: Duration },
    Err { error: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let replicas = if cli.replicas.is_empty() {
        start_local_replicas(3).await?
    } else {
        cli.replicas.iter().map(|u| ReplicaEndpoint::from_url(u.as_str())).collect()
    };

    eprintln!(
        "Using replicas:\n{}",
        replicas
            .iter()
            .map(|r| format!("- {}", r.url))
            .collect::<Vec<_>>()
            .join("\n")
    );

    let cfg = DispatchConfig::from_p99(replicas, Duration::from_millis(cli.stagger_ms));
    let dispatcher = Dispatcher::new(cfg);
    let in_flight = cli.max_in_flight as usize;

    if cli.calibrate {
        let mut rec = run_strategy(&dispatcher, Strategy::Simple, cli.calls, in_flight).await?;
        let p99 = rec.p99().unwrap_or_default();
        println!("single replica: p50={:?} p99={:?}", rec.p50().unwrap_or_default(), p99);
        println!("suggested --stagger-ms {}", p99.as_millis().max(1));
        return Ok(());
    }

    println!("\n=== {} calls per strategy, stagger {}ms ===", cli.calls, cli.stagger_ms);
    for strategy in Strategy::ALL {
        let mut rec = run_strategy(&dispatcher, strategy, cli.calls, in_flight).await?;
        println!(
            "{:>7}: ok={:6} p50={:>10?} p99={:>10?} max={:>10?}",
            strategy.name(),
            rec.count(),
            rec.p50().unwrap_or_default(),
            rec.p99().unwrap_or_default(),
            rec.max().unwrap_or_default(),
        );
    }

    println!("\n=== wins per replica ===");
    let mut stats: Vec<_> = dispatcher.replica_stats().into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    for (replica, s) in stats {
        println!(
            "{:>40}: wins = {:6}, avg_latency = {:8.3} ms, errors = {}",
            replica, s.wins, s.avg_latency_ms, s.errors
        );
    }

    Ok(())
}

async fn start_local_replicas(
    count: u16,
) -> Result<Vec<ReplicaEndpoint>, Box<dyn std::error::Error + Send + Sync>> {
    let mut replicas = Vec::with_capacity(count as usize);

    for i in 0..count {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let latency = Arc::new(SeededLatency::new(LatencyModel::default(), 1_000 + i as u64));

        tokio::spawn(async move {
            if let Err(e) = replica::serve(listener, latency).await {
                eprintln!("replica {addr} stopped: {e}");
            }
        });

        replicas.push(ReplicaEndpoint::new(
            format!("local-{i}").as_str(),
            format!("http://{addr}/ishealthy"),
        ));
    }

    Ok(replicas)
}

async fn run_strategy(
    dispatcher: &Dispatcher,
    strategy: Strategy,
    num_calls: usize,
    max_in_flight: usize,
) -> Result<LatencyRecorder, Box<dyn std::error::Error + Send + Sync>> {
    let max_in_flight = max_in_flight.max(1);
    let (tx, mut rx) = mpsc::channel::<CallOutcome>(max_in_flight * 2);
    let semaphore = Arc::new(Semaphore::new(max_in_flight));

    let consumer = tokio::spawn(async move {
        let mut rec = LatencyRecorder::new();
        let mut errors = 0usize;

        while let Some(outcome) = rx.recv().await {
            match outcome {
                CallOutcome::Ok { latency } => rec.record(latency),
                CallOutcome::Err { error } => {
                    errors += 1;
                    if errors <= 5 {
                        eprintln!("[{strategy}] ERR {error}");
                    }
                }
            }
        }

        rec
    });

    for _ in 0..num_calls {
        let dispatcher = dispatcher.clone();
        let tx = tx.clone();
        let permit = Arc::clone(&semaphore).acquire_owned().await?;

        tokio::spawn(async move {
            let _permit = permit;

            let start = Instant::now();
            let outcome = match dispatcher.dispatch(strategy).await {
                Ok(_) => CallOutcome::Ok {
                    latency: start.elapsed(),
                },
                Err(e) => CallOutcome::Err {
                    error: e.to_string(),
                },
            };

            let _ = tx.send(outcome).await;
        });
    }

    drop(tx);
    Ok(consumer.await?)
}
