//! Application state for the strategy comparison dashboard.

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use hedged_requests::{
    Dispatcher, LatencyRecorder, ReplicaEndpoint, ReplicaId, ReplicaStatsSnapshot, Strategy,
};

/// Events emitted by dispatch calls running in the background.
#[derive(Debug)]
pub enum AppEvent {
    /// A dispatch call completed.
    DispatchFinished {
        strategy: Strategy,
        replica: Option<ReplicaId>,
        latency_ms: f64,
        ok: bool,
        message: String,
    },
}

/// End-to-end latency of the calls made with one strategy.
#[derive(Debug, Default)]
pub struct StrategyStats {
    pub latencies: LatencyRecorder,
    pub errors: u64,
}

impl StrategyStats {
    pub fn p50_ms(&mut self) -> Option<f64> {
        self.latencies.p50().map(as_ms)
    }

    pub fn p99_ms(&mut self) -> Option<f64> {
        self.latencies.p99().map(as_ms)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.latencies.max().map(as_ms)
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Main application state for the TUI.
pub struct App {
    pub dispatcher: Dispatcher,
    pub replicas: Vec<ReplicaEndpoint>,
    pub strategy: Strategy,
    pub replica_count: usize,
    pub last_message: String,
    pub last_replica: Option<ReplicaId>,
    pub last_strategy: Option<Strategy>,
    pub last_latency_ms: Option<f64>,
    pub replica_stats: HashMap<ReplicaId, ReplicaStatsSnapshot>,
    pub strategy_stats: HashMap<Strategy, StrategyStats>,
    pub batch_mode: bool,
    pub batch_count: usize,
    pub batch_current: usize,
    pub batch_started: usize,
    pub session_start: Instant,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_errors: u64,
    pub call_timestamps: VecDeque<Instant>,
}

impl App {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let replicas = dispatcher.replicas().to_vec();
        let replica_count = replicas.len();

        let strategy_stats = Strategy::ALL
            .into_iter()
            .map(|s| (s, StrategyStats::default()))
            .collect();

        Self {
            dispatcher,
            replicas,
            strategy: Strategy::Hedged,
            replica_count,
            last_message: String::from("Ready. Press 'r' to run a call or 'b' for batch mode"),
            last_replica: None,
            last_strategy: None,
            last_latency_ms: None,
            replica_stats: HashMap::new(),
            strategy_stats,
            batch_mode: false,
            batch_count: 100,
            batch_current: 0,
            batch_started: 0,
            session_start: Instant::now(),
            total_calls: 0,
            total_successes: 0,
            total_errors: 0,
            call_timestamps: VecDeque::with_capacity(1000),
        }
    }

    /// Replicas the next call may contact, in hedging order.
    pub fn active_replicas(&self) -> &[ReplicaEndpoint] {
        &self.replicas[..self.replica_count.min(self.replicas.len())]
    }

    pub fn stagger_delay(&self) -> Duration {
        self.dispatcher.config().stagger_delay
    }

    pub fn toggle_strategy(&mut self) {
        self.strategy = self.strategy.next();
    }

    pub fn increase_replica_count(&mut self) {
        if self.replica_count < self.replicas.len() {
            self.replica_count += 1;
        }
    }

    pub fn decrease_replica_count(&mut self) {
        if self.replica_count > 1 {
            self.replica_count -= 1;
        }
    }

    pub fn toggle_batch_mode(&mut self) {
        self.batch_mode = !self.batch_mode;
        if self.batch_mode {
            self.batch_current = 0;
            self.batch_started = 0;
            self.last_message = format!(
                "Batch mode ON: {} {} calls queued",
                self.batch_count, self.strategy
            );
        } else {
            self.last_message = "Batch mode OFF".to_string();
        }
    }

    pub fn increase_batch_count(&mut self) {
        self.batch_count = (self.batch_count + 100).min(10_000);
    }

    pub fn decrease_batch_count(&mut self) {
        self.batch_count = (self.batch_count.saturating_sub(100)).max(100);
    }

    pub fn refresh_stats(&mut self) {
        self.replica_stats = self.dispatcher.replica_stats();
    }

    pub fn reset_stats(&mut self) {
        self.dispatcher.reset_stats();
        self.refresh_stats();
        for stats in self.strategy_stats.values_mut() {
            stats.latencies.clear();
            stats.errors = 0;
        }
        self.total_calls = 0;
        self.total_successes = 0;
        self.total_errors = 0;
        self.call_timestamps.clear();
        self.last_message = "Stats reset".to_string();
    }

    pub fn set_last_result(
        &mut self,
        strategy: Strategy,
        replica: Option<ReplicaId>,
        latency_ms: f64,
        ok: bool,
        message: String,
    ) {
        self.last_strategy = Some(strategy);
        self.last_replica = replica;
        self.last_latency_ms = Some(latency_ms);

        let stats = self.strategy_stats.entry(strategy).or_default();
        if ok {
            stats
                .latencies
                .record(Duration::from_secs_f64(latency_ms / 1000.0));
            self.total_successes += 1;
        } else {
            stats.errors += 1;
            self.total_errors += 1;
        }
        self.total_calls += 1;

        self.call_timestamps.push_back(Instant::now());
        if self.call_timestamps.len() > 1000 {
            self.call_timestamps.pop_front();
        }

        let status = if ok { "✓" } else { "✗" };
        self.last_message = format!("{} {} ({:.0} ms)", status, message, latency_ms);

        if self.batch_mode {
            self.batch_current += 1;
            if self.batch_current >= self.batch_count {
                self.batch_mode = false;
                self.last_message = format!("Batch complete! {} calls finished", self.batch_count);
            }
        }

        self.refresh_stats();
    }

    /// A batch call may start while fewer than `batch_count` have been started.
    pub fn should_run_call(&self) -> bool {
        self.batch_mode && self.batch_started < self.batch_count
    }

    pub fn mark_batch_call_started(&mut self) {
        self.batch_started += 1;
    }

    pub fn session_uptime(&self) -> Duration {
        self.session_start.elapsed()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls > 0 {
            (self.total_successes as f64 / self.total_calls as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn calls_per_second(&self) -> f64 {
        let one_sec_ago = Instant::now() - Duration::from_secs(1);

        self.call_timestamps
            .iter()
            .filter(|&&ts| ts > one_sec_ago)
            .count() as f64
    }
}
