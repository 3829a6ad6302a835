use std::{fmt, sync::Arc, time::Duration};

/// Origin label of a replica, reported alongside every payload it serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId(pub Arc<str>);

impl ReplicaId {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Address of a single backend replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaEndpoint {
    /// Origin label for this replica.
    pub id: ReplicaId,
    /// Full URL the invoker requests, e.g. `http://localhost:8090/ishealthy`.
    pub url: String,
}

impl ReplicaEndpoint {
    pub fn new(id: impl Into<ReplicaId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Builds an endpoint labelled with its own URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: ReplicaId::new(url.as_str()),
            url,
        }
    }
}

/// Dispatch configuration.
///
/// Passed to the dispatcher at construction time. The stagger delay should be the
/// measured p99 latency of a single replica, see [`DispatchConfig::from_p99`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Ordered replica set. Hedged calls issue attempts in this order.
    pub replicas: Vec<ReplicaEndpoint>,

    /// How long a hedged call waits for pending attempts before issuing the next one.
    pub stagger_delay: Duration,

    /// Deadline for a whole dispatch call, across every attempt it issues.
    pub overall_timeout: Duration,

    /// Deadline for a single HTTP attempt.
    pub attempt_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            replicas: Vec::new(),
            stagger_delay: Duration::from_millis(16),
            overall_timeout: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}

impl DispatchConfig {
    pub fn new(replicas: Vec<ReplicaEndpoint>) -> Self {
        Self {
            replicas,
            ..Self::default()
        }
    }

    /// Creates a configuration whose stagger delay is a measured p99 latency.
    ///
    /// Hedging after the p99 means roughly one call in a hundred pays for a second
    /// attempt.
    pub fn from_p99(replicas: Vec<ReplicaEndpoint>, p99: Duration) -> Self {
        Self {
            replicas,
            stagger_delay: p99,
            ..Self::default()
        }
    }

    pub fn with_stagger_delay(mut self, stagger_delay: Duration) -> Self {
        self.stagger_delay = stagger_delay;
        self
    }

    pub fn with_overall_timeout(mut self, overall_timeout: Duration) -> Self {
        self.overall_timeout = overall_timeout;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }
}
