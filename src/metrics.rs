//! Performance metrics and decision statistics for the loan approval pipeline.

use crate::types::decision::Decision;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Applications evaluated to a decision
    pub applications_decided: AtomicU64,
    /// Approved applications
    pub approvals: AtomicU64,
    /// Rejected applications
    pub rejections: AtomicU64,
    /// Failures by stage (encoding, inference, request)
    failures_by_stage: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            applications_decided: AtomicU64::new(0),
            approvals: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            failures_by_stage: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record an evaluated application
    pub fn record_decision(&self, processing_time: Duration, decision: Decision) {
        self.applications_decided.fetch_add(1, Ordering::Relaxed);
        match decision {
            Decision::Approved => self.approvals.fetch_add(1, Ordering::Relaxed),
            Decision::Rejected => self.rejections.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record an application that could not be evaluated
    pub fn record_failure(&self, stage: &str) {
        if let Ok(mut by_stage) = self.failures_by_stage.write() {
            *by_stage.entry(stage.to_string()).or_insert(0) += 1;
        }
    }

    /// Failures by stage
    pub fn get_failures_by_stage(&self) -> HashMap<String, u64> {
        self.failures_by_stage
            .read()
            .map(|by_stage| by_stage.clone())
            .unwrap_or_default()
    }

    pub fn total_failures(&self) -> u64 {
        self.get_failures_by_stage().values().sum()
    }

    /// Share of decided applications that were approved
    pub fn approval_rate(&self) -> f64 {
        let decided = self.applications_decided.load(Ordering::Relaxed);
        if decided == 0 {
            return 0.0;
        }
        self.approvals.load(Ordering::Relaxed) as f64 / decided as f64
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted: Vec<u64> = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (applications per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.applications_decided.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let decided = self.applications_decided.load(Ordering::Relaxed);
        let approvals = self.approvals.load(Ordering::Relaxed);
        let rejections = self.rejections.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();
        let failures = self.get_failures_by_stage();

        info!(
            decided,
            approvals,
            rejections,
            approval_rate = format!("{:.1}%", self.approval_rate() * 100.0),
            throughput = format!("{:.1} app/s", self.get_throughput()),
            "Decision summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Processing time"
        );
        for (stage, count) in &failures {
            info!(stage = %stage, count, "Failed applications");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
