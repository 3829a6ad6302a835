//! Latency bookkeeping used to compare strategies and to calibrate the stagger delay.

use std::time::Duration;

/// Collects observed latencies and answers percentile queries.
#[derive(Debug, Clone, Default)]
pub struct LatencyRecorder {
    samples: Vec<Duration>,
    sorted: bool,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, latency: Duration) {
        self.samples.push(latency);
        self.sorted = false;
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sorted = true;
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    /// Nearest-rank percentile, `p` in `(0, 100]`.
    ///
    /// Returns `None` when nothing has been recorded.
    pub fn percentile(&mut self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        if !self.sorted {
            self.samples.sort_unstable();
            self.sorted = true;
        }

        let p = p.clamp(f64::MIN_POSITIVE, 100.0);
        let rank = ((p / 100.0) * self.samples.len() as f64).ceil() as usize;
        let idx = rank.clamp(1, self.samples.len()) - 1;
        Some(self.samples[idx])
    }

    pub fn p50(&mut self) -> Option<Duration> {
        self.percentile(50.0)
    }

    pub fn p99(&mut self) -> Option<Duration> {
        self.percentile(99.0)
    }
}
