//! Simulated backend replica.
//!
//! Answers `GET /ishealthy` after a latency drawn from a [`LatencySource`]. The
//! default model replies after a fixed baseline, with a small share of requests paying
//! a much larger extra delay, which gives the pool a realistic latency tail.

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{extract::State, http::StatusCode, routing::get, Router};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::net::TcpListener;

/// Body served by a healthy replica.
pub const HEALTHY_BODY: &str = "Healthy";

/// Baseline-plus-tail latency distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyModel {
    /// Delay every request pays.
    pub baseline: Duration,
    /// Extra delay paid by requests that land in the tail.
    pub tail_extra: Duration,
    /// Share of requests, in percent, that land in the tail.
    pub tail_percent: u32,
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self {
            baseline: Duration::from_millis(15),
            tail_extra: Duration::from_millis(100),
            tail_percent: 3,
        }
    }
}

impl LatencyModel {
    /// Maps a uniform draw in `0..100` to a delay.
    pub fn delay_for(&self, draw: u32) -> Duration {
        if draw >= 100u32.saturating_sub(self.tail_percent) {
            self.baseline + self.tail_extra
        } else {
            self.baseline
        }
    }
}

/// Supplies the delay for each incoming request.
pub trait LatencySource: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Draws delays from a [`LatencyModel`] with an explicitly seeded generator.
#[derive(Debug)]
pub struct SeededLatency {
    model: LatencyModel,
    rng: Mutex<StdRng>,
}

impl SeededLatency {
    pub fn new(model: LatencyModel, seed: u64) -> Self {
        Self {
            model,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl LatencySource for SeededLatency {
    fn next_delay(&self) -> Duration {
        let draw = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..100),
            Err(poisoned) => poisoned.into_inner().gen_range(0..100),
        };
        self.model.delay_for(draw)
    }
}

/// Replays a fixed sequence of delays, wrapping around at the end.
#[derive(Debug)]
pub struct ScriptedLatency {
    delays: Vec<Duration>,
    cursor: AtomicUsize,
}

impl ScriptedLatency {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Always answers after `delay`.
    pub fn constant(delay: Duration) -> Self {
        Self::new(vec![delay])
    }
}

impl LatencySource for ScriptedLatency {
    fn next_delay(&self) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.delays.len();
        self.delays[idx]
    }
}

struct ReplicaState {
    latency: Arc<dyn LatencySource>,
    served: AtomicU64,
}

/// Builds the replica's HTTP routes.
pub fn router(latency: Arc<dyn LatencySource>) -> Router {
    let state = Arc::new(ReplicaState {
        latency,
        served: AtomicU64::new(0),
    });

    Router::new()
        .route("/ishealthy", get(is_healthy))
        .with_state(state)
}

async fn is_healthy(State(state): State<Arc<ReplicaState>>) -> (StatusCode, &'static str) {
    let delay = state.latency.next_delay();
    let served = state.served.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::debug!(delay_ms = delay.as_millis() as u64, served, "health check");

    tokio::time::sleep(delay).await;
    (StatusCode::OK, HEALTHY_BODY)
}

/// Serves the replica on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, latency: Arc<dyn LatencySource>) -> std::io::Result<()> {
    axum::serve(listener, router(latency)).await
}
