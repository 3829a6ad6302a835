use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{DispatchConfig, ReplicaEndpoint, ReplicaId},
    errors::{AttemptError, DispatchError},
    invoker::{HttpInvoker, Invoker, Reply},
};

/// How a dispatch call spreads attempts across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One attempt against the first replica.
    Simple,
    /// One attempt per replica, all issued at once.
    Fanout,
    /// Attempts issued one at a time, `stagger_delay` apart.
    Hedged,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Simple, Strategy::Fanout, Strategy::Hedged];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Fanout => "fanout",
            Strategy::Hedged => "hedged",
        }
    }

    /// The strategy after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Strategy::Simple => Strategy::Fanout,
            Strategy::Fanout => Strategy::Hedged,
            Strategy::Hedged => Strategy::Simple,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
struct ReplicaStats {
    wins: u64,
    total_latency_ms: f64,
    errors: u64,
}

type StatsMap = Arc<Mutex<HashMap<ReplicaId, ReplicaStats>>>;

/// Snapshot of replica performance statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaStatsSnapshot {
    /// Number of calls this replica won.
    pub wins: u64,
    /// Average attempt latency in milliseconds of the winning attempts.
    pub avg_latency_ms: f64,
    /// Number of failed attempts against this replica.
    pub errors: u64,
}

/// Dispatches requests across a fixed set of replicas.
///
/// Every call owns its attempts: they are spawned as independent tasks, report into a
/// channel sized to the number of replicas, and are cancelled as soon as the call has
/// its result.
pub struct Dispatcher<I = HttpInvoker> {
    invoker: Arc<I>,
    cfg: DispatchConfig,
    stats: StatsMap,
}

impl<I> Clone for Dispatcher<I> {
    fn clone(&self) -> Self {
        Self {
            invoker: Arc::clone(&self.invoker),
            cfg: self.cfg.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl Dispatcher<HttpInvoker> {
    /// Creates a dispatcher issuing HTTP attempts.
    ///
    /// # Example
    /// ```no_run
    /// use hedged_requests::{DispatchConfig, Dispatcher, ReplicaEndpoint};
    /// use std::time::Duration;
    ///
    /// let replicas = vec![
    ///     ReplicaEndpoint::new("a", "http://localhost:8090/ishealthy"),
    ///     ReplicaEndpoint::new("b", "http://localhost:8091/ishealthy"),
    /// ];
    ///
    /// let dispatcher = Dispatcher::new(DispatchConfig::from_p99(replicas, Duration::from_millis(16)));
    /// ```
    pub fn new(cfg: DispatchConfig) -> Self {
        let invoker = HttpInvoker::new(cfg.attempt_timeout);
        Self::with_invoker(cfg, invoker)
    }
}

impl<I: Invoker> Dispatcher<I> {
    pub fn with_invoker(cfg: DispatchConfig, invoker: I) -> Self {
        let mut stats_map = HashMap::new();
        for replica in &cfg.replicas {
            stats_map.insert(replica.id.clone(), ReplicaStats::default());
        }

        Self {
            invoker: Arc::new(invoker),
            cfg,
            stats: Arc::new(Mutex::new(stats_map)),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.cfg
    }

    /// Returns the configured replicas.
    pub fn replicas(&self) -> &[ReplicaEndpoint] {
        &self.cfg.replicas
    }

    /// Returns a snapshot of accumulated statistics for each replica.
    pub fn replica_stats(&self) -> HashMap<ReplicaId, ReplicaStatsSnapshot> {
        let stats = self.stats.lock().expect("replica stats mutex poisoned");

        stats
            .iter()
            .map(|(id, s)| {
                let avg = if s.wins > 0 {
                    s.total_latency_ms / (s.wins as f64)
                } else {
                    0.0
                };

                (
                    id.clone(),
                    ReplicaStatsSnapshot {
                        wins: s.wins,
                        avg_latency_ms: avg,
                        errors: s.errors,
                    },
                )
            })
            .collect()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            for entry in stats.values_mut() {
                *entry = ReplicaStats::default();
            }
        }
    }

    /// Runs `strategy` against the configured replicas.
    pub async fn dispatch(&self, strategy: Strategy) -> Result<Reply, DispatchError> {
        match strategy {
            Strategy::Simple => self.simple().await,
            Strategy::Fanout => self.fanout().await,
            Strategy::Hedged => self.hedged().await,
        }
    }

    /// Single attempt against the first configured replica.
    pub async fn simple(&self) -> Result<Reply, DispatchError> {
        let replica = self.cfg.replicas.first().ok_or(DispatchError::NoReplicas)?;
        self.dispatch_simple(replica).await
    }

    /// Fanout across every configured replica.
    pub async fn fanout(&self) -> Result<Reply, DispatchError> {
        self.dispatch_fanout(&self.cfg.replicas).await
    }

    /// Hedged call across the configured replicas with the configured stagger delay.
    pub async fn hedged(&self) -> Result<Reply, DispatchError> {
        self.dispatch_hedged(&self.cfg.replicas, self.cfg.stagger_delay).await
    }

    /// Issues exactly one attempt and returns its outcome.
    pub async fn dispatch_simple(
        &self,
        replica: &ReplicaEndpoint,
    ) -> Result<Reply, DispatchError> {
        let attempt = async {
            tracing::debug!(replica = %replica.id, "issuing attempt");
            match self.invoker.invoke(replica.clone()).await {
                Ok(reply) => Ok(reply),
                Err(e) => {
                    self.record_error(&replica.id);
                    Err(DispatchError::AllFailed(vec![(replica.id.clone(), e)]))
                }
            }
        };

        self.with_deadline(Strategy::Simple, attempt).await
    }

    /// Issues one attempt per replica at once and returns the first success.
    pub async fn dispatch_fanout(
        &self,
        replicas: &[ReplicaEndpoint],
    ) -> Result<Reply, DispatchError> {
        if replicas.is_empty() {
            return Err(DispatchError::NoReplicas);
        }

        let fanout_logic = async {
            let mut race = self.race(replicas.len());

            for replica in replicas {
                race.issue(replica);
            }

            while race.pending() > 0 {
                if let Some(reply) = race.next().await {
                    return Ok(reply);
                }
            }

            Err(race.into_error())
        };

        self.with_deadline(Strategy::Fanout, fanout_logic).await
    }

    /// Issues attempts in order, one every `stagger_delay` until one succeeds.
    ///
    /// The next replica is contacted when the stagger delay elapses without a success,
    /// or right away when a failure leaves no attempt in flight. Once every replica has
    /// been issued the call waits on the pending attempts without a stagger timeout.
    /// The first attempt to succeed wins, whatever its position in the issue order.
    pub async fn dispatch_hedged(
        &self,
        replicas: &[ReplicaEndpoint],
        stagger_delay: Duration,
    ) -> Result<Reply, DispatchError> {
        if replicas.is_empty() {
            return Err(DispatchError::NoReplicas);
        }

        let hedging_logic = async {
            let mut race = self.race(replicas.len());
            let mut remaining = replicas.iter();

            if let Some(first) = remaining.next() {
                race.issue(first);
            }
            let mut next_replica = remaining.next();

            let stagger = time::sleep(stagger_delay);
            tokio::pin!(stagger);

            loop {
                if race.pending() == 0 && next_replica.is_none() {
                    break;
                }

                tokio::select! {
                    resolved = race.next(), if race.pending() > 0 => {
                        if let Some(reply) = resolved {
                            return Ok(reply);
                        }
                        if race.pending() == 0 {
                            if let Some(replica) = next_replica.take() {
                                race.issue(replica);
                                next_replica = remaining.next();
                                stagger.as_mut().reset(Instant::now() + stagger_delay);
                            }
                        }
                    }
                    _ = &mut stagger, if next_replica.is_some() => {
                        if let Some(replica) = next_replica.take() {
                            tracing::debug!(
                                replica = %replica.id,
                                stagger_ms = stagger_delay.as_millis() as u64,
                                "stagger delay elapsed, hedging"
                            );
                            race.issue(replica);
                            next_replica = remaining.next();
                            stagger.as_mut().reset(Instant::now() + stagger_delay);
                        }
                    }
                }
            }

            Err(race.into_error())
        };

        self.with_deadline(Strategy::Hedged, hedging_logic).await
    }

    async fn with_deadline<F>(&self, strategy: Strategy, call: F) -> Result<Reply, DispatchError>
    where
        F: Future<Output = Result<Reply, DispatchError>>,
    {
        let start = Instant::now();
        let timed = time::timeout(self.cfg.overall_timeout, call).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match timed {
            Err(_) => {
                tracing::warn!(
                    %strategy,
                    timeout_ms = self.cfg.overall_timeout.as_millis() as u64,
                    "dispatch timed out"
                );
                Err(DispatchError::Timeout(self.cfg.overall_timeout))
            }
            Ok(Ok(reply)) => {
                if let Ok(mut stats) = self.stats.lock() {
                    let entry = stats.entry(reply.replica.clone()).or_default();
                    entry.wins += 1;
                    entry.total_latency_ms += reply.elapsed.as_secs_f64() * 1000.0;
                }
                tracing::info!(
                    %strategy,
                    winner = %reply.replica,
                    elapsed_ms,
                    "dispatch completed"
                );
                Ok(reply)
            }
            Ok(Err(e)) => {
                tracing::warn!(%strategy, error = %e, "dispatch failed");
                Err(e)
            }
        }
    }

    fn race(&self, max_attempts: usize) -> Race<I> {
        Race::new(Arc::clone(&self.invoker), Arc::clone(&self.stats), max_attempts)
    }

    fn record_error(&self, replica: &ReplicaId) {
        record_error(&self.stats, replica);
    }
}

fn record_error(stats: &StatsMap, replica: &ReplicaId) {
    if let Ok(mut stats) = stats.lock() {
        stats.entry(replica.clone()).or_default().errors += 1;
    }
}

type Resolution = (ReplicaId, Result<Reply, AttemptError>);

/// Attempts of one dispatch call.
///
/// Dropping the race cancels every attempt still in flight, including when the call
/// is abandoned by its deadline.
struct Race<I> {
    invoker: Arc<I>,
    stats: StatsMap,
    tx: mpsc::Sender<Resolution>,
    rx: mpsc::Receiver<Resolution>,
    cancel: CancellationToken,
    issued: usize,
    resolved: usize,
    failures: Vec<(ReplicaId, AttemptError)>,
}

impl<I: Invoker> Race<I> {
    fn new(invoker: Arc<I>, stats: StatsMap, max_attempts: usize) -> Self {
        // One slot per attempt so a losing attempt never blocks on send.
        let (tx, rx) = mpsc::channel(max_attempts.max(1));

        Self {
            invoker,
            stats,
            tx,
            rx,
            cancel: CancellationToken::new(),
            issued: 0,
            resolved: 0,
            failures: Vec::new(),
        }
    }

    fn issue(&mut self, replica: &ReplicaEndpoint) {
        tracing::debug!(replica = %replica.id, attempt = self.issued, "issuing attempt");

        let attempt = self.invoker.invoke(replica.clone());
        let id = replica.id.clone();
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::trace!(replica = %id, "attempt cancelled");
                }
                result = attempt => {
                    let _ = tx.send((id, result)).await;
                }
            }
        });

        self.issued += 1;
    }

    fn pending(&self) -> usize {
        self.issued - self.resolved
    }

    /// Waits for the next attempt to resolve.
    ///
    /// Returns the reply on success; failures are recorded and yield `None`.
    async fn next(&mut self) -> Option<Reply> {
        let Some((id, result)) = self.rx.recv().await else {
            self.resolved = self.issued;
            return None;
        };
        self.resolved += 1;

        match result {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::debug!(replica = %id, error = %e, "attempt failed");
                record_error(&self.stats, &id);
                self.failures.push((id, e));
                None
            }
        }
    }

    fn into_error(mut self) -> DispatchError {
        DispatchError::AllFailed(std::mem::take(&mut self.failures))
    }
}

impl<I> Drop for Race<I> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
