//! Metrics collection for InferQ
//!
//! This module provides Prometheus metrics for observability.
//! All metrics are carefully designed to minimize overhead in the hot path.

use lazy_static::lazy_static;
use prometheus::{Histogram, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics registry for InferQ
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub worker: WorkerMetrics,
    pub harness: HarnessMetrics,
}

/// Worker-side metrics
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    /// Total deliveries admitted from the work queue
    pub deliveries_total: IntCounter,

    /// Total deliveries acknowledged
    pub acked_total: IntCounter,

    /// Total deliveries negatively acknowledged
    pub nacked_total: IntCounter,

    /// Pipeline execution duration (preprocess + predict)
    pub pipeline_duration: Histogram,

    /// Reply publish duration
    pub publish_duration: Histogram,

    /// Deliveries currently unresolved
    pub inflight: IntGauge,
}

/// Load-generator metrics
#[derive(Debug, Clone)]
pub struct HarnessMetrics {
    /// Requests published to the work queue
    pub requests_published_total: IntCounter,

    /// Replies consumed from the reply queue
    pub replies_received_total: IntCounter,

    /// Per-request publish duration
    pub publish_duration: Histogram,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        // Worker metrics
        let deliveries_total = IntCounter::new(
            "worker_deliveries_total",
            "Total deliveries admitted from the work queue"
        ).unwrap();

        let acked_total = IntCounter::new(
            "worker_acked_total",
            "Total deliveries acknowledged"
        ).unwrap();

        let nacked_total = IntCounter::new(
            "worker_nacked_total",
            "Total deliveries negatively acknowledged"
        ).unwrap();

        let pipeline_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "worker_pipeline_duration_seconds",
                "Pipeline execution duration in seconds"
            ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
        ).unwrap();

        let publish_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "worker_publish_duration_seconds",
                "Reply publish duration in seconds"
            ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5])
        ).unwrap();

        let inflight = IntGauge::new(
            "worker_inflight_deliveries",
            "Deliveries currently unresolved"
        ).unwrap();

        // Harness metrics
        let requests_published_total = IntCounter::new(
            "harness_requests_published_total",
            "Requests published to the work queue"
        ).unwrap();

        let replies_received_total = IntCounter::new(
            "harness_replies_received_total",
            "Replies consumed from the reply queue"
        ).unwrap();

        let harness_publish_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "harness_publish_duration_seconds",
                "Per-request publish duration in seconds"
            ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1])
        ).unwrap();

        // Register all metrics
        registry.register(Box::new(deliveries_total.clone())).unwrap();
        registry.register(Box::new(acked_total.clone())).unwrap();
        registry.register(Box::new(nacked_total.clone())).unwrap();
        registry.register(Box::new(pipeline_duration.clone())).unwrap();
        registry.register(Box::new(publish_duration.clone())).unwrap();
        registry.register(Box::new(inflight.clone())).unwrap();

        registry.register(Box::new(requests_published_total.clone())).unwrap();
        registry.register(Box::new(replies_received_total.clone())).unwrap();
        registry.register(Box::new(harness_publish_duration.clone())).unwrap();

        let worker = WorkerMetrics {
            deliveries_total,
            acked_total,
            nacked_total,
            pipeline_duration,
            publish_duration,
            inflight,
        };

        let harness = HarnessMetrics {
            requests_published_total,
            replies_received_total,
            publish_duration: harness_publish_duration,
        };

        MetricsRegistry {
            registry,
            worker,
            harness,
        }
    }

    /// Gather all metrics as text
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry() {
        let metrics = MetricsRegistry::new();

        // Record some metrics
        metrics.worker.deliveries_total.inc();
        metrics.worker.acked_total.inc();
        metrics.worker.inflight.set(3);
        metrics.harness.requests_published_total.inc();

        // Gather metrics
        let output = metrics.gather();
        assert!(output.contains("worker_deliveries_total"));
        assert!(output.contains("worker_inflight_deliveries"));
        assert!(output.contains("harness_requests_published_total"));
    }
}
