//! Prediction metrics and statistics tracking

use crate::error::PredictionError;
use crate::types::assessment::RiskLevel;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector shared by all request handlers
pub struct PredictionMetrics {
    /// Total prediction requests received
    pub requests: AtomicU64,
    /// Requests answered with an assessment
    pub succeeded: AtomicU64,
    pub validation_failures: AtomicU64,
    pub artifact_failures: AtomicU64,
    pub inference_failures: AtomicU64,
    /// Assessments by risk level
    by_level: RwLock<BTreeMap<RiskLevel, u64>>,
    /// End-to-end latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Clipped score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PredictionMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            artifact_failures: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            by_level: RwLock::new(BTreeMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful assessment
    pub fn record_prediction(&self, latency: Duration, risk_score: f64, level: RiskLevel) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);

        let bucket = (risk_score * 10.0).clamp(0.0, 9.0) as usize;
        self.score_buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)[bucket] += 1;

        *self
            .by_level
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(level)
            .or_insert(0) += 1;
    }

    /// Record a failed request against the counter for its error variant
    pub fn record_failure(&self, error: &PredictionError, latency: Duration) {
        let counter = match error {
            PredictionError::Validation(_) => &self.validation_failures,
            PredictionError::Artifact(_) => &self.artifact_failures,
            PredictionError::Inference(_) => &self.inference_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        let mut times = self.latencies.write().unwrap_or_else(PoisonError::into_inner);
        times.push(latency.as_micros() as u64);
        if times.len() > MAX_LATENCY_SAMPLES {
            times.drain(0..MAX_LATENCY_SAMPLES / 2);
        }
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = self
            .latencies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let pct = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: pct(0.5),
            p95_us: pct(0.95),
            p99_us: pct(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_level = self
            .by_level
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(level, count)| (level.as_str().to_string(), *count))
            .collect();

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            artifact_failures: self.artifact_failures.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            throughput_rps: self.throughput(),
            by_level,
            score_distribution: *self
                .score_buckets
                .read()
                .unwrap_or_else(PoisonError::into_inner),
            latency: self.latency_stats(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let s = self.snapshot();
        let failed = s.validation_failures + s.artifact_failures + s.inference_failures;

        info!(
            requests = s.requests,
            succeeded = s.succeeded,
            failed = failed,
            throughput = format!("{:.2} req/s", s.throughput_rps),
            "Prediction metrics summary"
        );
        info!(
            mean_us = s.latency.mean_us,
            p50_us = s.latency.p50_us,
            p95_us = s.latency.p95_us,
            p99_us = s.latency.p99_us,
            "Prediction latency"
        );
        for (level, count) in &s.by_level {
            info!(level = %level, count = count, "Assessments by risk level");
        }
        if failed > 0 {
            info!(
                validation = s.validation_failures,
                artifact = s.artifact_failures,
                inference = s.inference_failures,
                "Failures by kind"
            );
        }
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Point-in-time copy of all metrics, served on `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub succeeded: u64,
    pub validation_failures: u64,
    pub artifact_failures: u64,
    pub inference_failures: u64,
    pub throughput_rps: f64,
    pub by_level: BTreeMap<String, u64>,
    pub score_distribution: [u64; 10],
    pub latency: LatencyStats,
}

/// Periodically logs a metrics summary
pub struct MetricsReporter {
    metrics: Arc<PredictionMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PredictionMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
