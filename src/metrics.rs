//! In-process latency windows and outcome counters for the orchestrator.
//! Each named latency keeps its most recent samples (microseconds) and reports p50/p95/p99.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

const WINDOW: usize = 1024;

/// Running timer; records into its registry when stopped.
pub struct Timer {
    name: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl Timer {
    /// Record and return the elapsed microseconds.
    pub fn stop(self) -> u64 {
        let us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.registry.observe(self.name, us);
        us
    }
}

/// Bounded window of recent latency samples.
struct LatencyWindow {
    samples: VecDeque<u64>,
    limit: usize,
}

impl LatencyWindow {
    fn with_limit(limit: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(limit),
            limit,
        }
    }

    fn observe(&mut self, us: u64) {
        if self.samples.len() == self.limit {
            self.samples.pop_front();
        }
        self.samples.push_back(us);
    }

    /// Nearest-rank percentile, `q` in 0..=100.
    fn quantile(&self, q: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let last = sorted.len() - 1;
        let rank = ((q.clamp(0.0, 100.0) / 100.0) * last as f64).round() as usize;
        sorted[rank.min(last)]
    }

    fn summarize(&self) -> LatencySummary {
        LatencySummary {
            p50_us: self.quantile(50.0),
            p95_us: self.quantile(95.0),
            p99_us: self.quantile(99.0),
            count: self.samples.len(),
        }
    }
}

#[derive(Default)]
pub struct MetricsRegistry {
    latencies: Mutex<HashMap<&'static str, LatencyWindow>>,
    counters: Mutex<HashMap<&'static str, u64>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, name: &'static str, us: u64) {
        self.latencies
            .lock()
            .entry(name)
            .or_insert_with(|| LatencyWindow::with_limit(WINDOW))
            .observe(us);
    }

    pub fn start_timer(self: &Arc<Self>, name: &'static str) -> Timer {
        Timer {
            name,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_default() += 1;
    }

    #[cfg(test)]
    fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Percentile (0-100) of a latency in microseconds; 0 when nothing was observed.
    #[cfg(test)]
    fn quantile(&self, name: &str, q: f64) -> u64 {
        self.latencies
            .lock()
            .get(name)
            .map_or(0, |window| window.quantile(q))
    }

    pub fn summary(&self) -> MetricsSnapshot {
        let latencies = self
            .latencies
            .lock()
            .iter()
            .map(|(name, window)| (name.to_string(), window.summarize()))
            .collect();
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(name, n)| (name.to_string(), *n))
            .collect();
        MetricsSnapshot {
            latencies,
            counters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub latencies: HashMap<String, LatencySummary>,
    pub counters: HashMap<String, u64>,
}

pub mod metric_names {
    pub const CACHE_LOOKUP: &str = "cache_lookup";
    pub const PROVIDER_CALL: &str = "provider_call";
    pub const TRANSLATE_TOTAL: &str = "translate_total";

    pub const OUTCOME_CACHE_HIT: &str = "outcome_cache_hit";
    pub const OUTCOME_TRANSLATED: &str = "outcome_translated";
    pub const OUTCOME_QUOTA_EXCEEDED: &str = "outcome_quota_exceeded";
    pub const OUTCOME_PROVIDER_FAILED: &str = "outcome_provider_failed";
}
