// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service Implementation
//!
//! Prometheus-based metrics collection and export for worker observability.
//! Provides job execution metrics (submitted/completed/failed/drained),
//! per-step success/failure/duration metrics, per-semaphore in-flight/queue
//! depth gauges and latency, and an HTTP-scrapeable text encoding. Thread-safe
//! with low overhead.

use prometheus::{Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use episode_pipeline_domain::error::WorkerError;

/// Prometheus metrics service for worker observability.
///
/// # Metric Categories
///
/// - **Job metrics**: submitted/completed/failed/drained counters, end-to-end
///   duration histogram
/// - **Step metrics**: success/failure counters and duration histogram, keyed
///   by step name (and error category on failure)
/// - **Semaphore metrics**: in-flight and queue-depth gauges, acquire-to-release
///   latency histogram, keyed by resource label (`disk`/`io`/`http`/`db`)
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    jobs_submitted_total: IntCounter,
    jobs_completed_total: IntCounter,
    jobs_failed_total: IntCounter,
    jobs_drained_total: IntCounter,
    job_duration_seconds: Histogram,

    step_success_total: IntCounterVec,
    step_failure_total: IntCounterVec,
    step_duration_seconds: HistogramVec,

    semaphore_in_flight: IntGaugeVec,
    semaphore_queue_depth: IntGaugeVec,
    semaphore_latency_seconds: HistogramVec,

    active_jobs: IntGauge,
    queue_depth: Gauge,
    error_rate: GaugeVec,
}

impl MetricsService {
    /// Create a new MetricsService with Prometheus registry
    pub fn new() -> Result<Self, WorkerError> {
        let registry = Registry::new();

        let jobs_submitted_total = IntCounter::with_opts(
            Opts::new("jobs_submitted_total", "Total number of jobs submitted").namespace("episode_pipeline"),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create jobs_submitted_total metric: {e}")))?;

        let jobs_completed_total = IntCounter::with_opts(
            Opts::new("jobs_completed_total", "Total number of jobs completed successfully").namespace("episode_pipeline"),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create jobs_completed_total metric: {e}")))?;

        let jobs_failed_total = IntCounter::with_opts(
            Opts::new("jobs_failed_total", "Total number of jobs that failed terminally").namespace("episode_pipeline"),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create jobs_failed_total metric: {e}")))?;

        let jobs_drained_total = IntCounter::with_opts(
            Opts::new("jobs_drained_total", "Total number of jobs drained due to a fatal downloader condition")
                .namespace("episode_pipeline"),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create jobs_drained_total metric: {e}")))?;

        let job_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("job_duration_seconds", "End-to-end job processing duration")
                .namespace("episode_pipeline")
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create job_duration_seconds metric: {e}")))?;

        let step_success_total = IntCounterVec::new(
            Opts::new("step_success_total", "Total successful runs of a pipeline step").namespace("episode_pipeline"),
            &["step"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create step_success_total metric: {e}")))?;

        let step_failure_total = IntCounterVec::new(
            Opts::new("step_failure_total", "Total failed runs of a pipeline step").namespace("episode_pipeline"),
            &["step", "error"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create step_failure_total metric: {e}")))?;

        let step_duration_seconds = HistogramVec::new(
            HistogramOpts::new("step_duration_seconds", "Duration of a pipeline step")
                .namespace("episode_pipeline")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0]),
            &["step"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create step_duration_seconds metric: {e}")))?;

        let semaphore_in_flight = IntGaugeVec::new(
            Opts::new("semaphore_in_flight", "Permits currently held on a named semaphore").namespace("episode_pipeline"),
            &["resource"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create semaphore_in_flight metric: {e}")))?;

        let semaphore_queue_depth = IntGaugeVec::new(
            Opts::new("semaphore_queue_depth", "Callers waiting on a named semaphore").namespace("episode_pipeline"),
            &["resource"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create semaphore_queue_depth metric: {e}")))?;

        let semaphore_latency_seconds = HistogramVec::new(
            HistogramOpts::new("semaphore_latency_seconds", "Time spent holding a named semaphore permit")
                .namespace("episode_pipeline")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]),
            &["resource"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create semaphore_latency_seconds metric: {e}")))?;

        let active_jobs = IntGauge::with_opts(
            Opts::new("active_jobs", "Number of jobs currently being processed").namespace("episode_pipeline"),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create active_jobs metric: {e}")))?;

        let queue_depth = Gauge::with_opts(
            Opts::new("queue_depth", "Approximate depth of the upstream message queue").namespace("episode_pipeline"),
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create queue_depth metric: {e}")))?;

        let error_rate = GaugeVec::new(
            Opts::new("error_rate", "Rolling error rate by category").namespace("episode_pipeline"),
            &["category"],
        )
        .map_err(|e| WorkerError::internal_error(format!("failed to create error_rate metric: {e}")))?;

        for (name, err): (&str, Result<(), prometheus::Error>) = &[
            ("jobs_submitted_total", registry.register(Box::new(jobs_submitted_total.clone()))),
            ("jobs_completed_total", registry.register(Box::new(jobs_completed_total.clone()))),
            ("jobs_failed_total", registry.register(Box::new(jobs_failed_total.clone()))),
            ("jobs_drained_total", registry.register(Box::new(jobs_drained_total.clone()))),
            ("job_duration_seconds", registry.register(Box::new(job_duration_seconds.clone()))),
            ("step_success_total", registry.register(Box::new(step_success_total.clone()))),
            ("step_failure_total", registry.register(Box::new(step_failure_total.clone()))),
            ("step_duration_seconds", registry.register(Box::new(step_duration_seconds.clone()))),
            ("semaphore_in_flight", registry.register(Box::new(semaphore_in_flight.clone()))),
            ("semaphore_queue_depth", registry.register(Box::new(semaphore_queue_depth.clone()))),
            ("semaphore_latency_seconds", registry.register(Box::new(semaphore_latency_seconds.clone()))),
            ("active_jobs", registry.register(Box::new(active_jobs.clone()))),
            ("queue_depth", registry.register(Box::new(queue_depth.clone()))),
            ("error_rate", registry.register(Box::new(error_rate.clone()))),
        ] {
            if let Err(e) = err {
                return Err(WorkerError::internal_error(format!("failed to register {name}: {e}")));
            }
        }

        debug!("MetricsService initialized with Prometheus registry");

        Ok(Self {
            registry: Arc::new(registry),
            jobs_submitted_total,
            jobs_completed_total,
            jobs_failed_total,
            jobs_drained_total,
            job_duration_seconds,
            step_success_total,
            step_failure_total,
            step_duration_seconds,
            semaphore_in_flight,
            semaphore_queue_depth,
            semaphore_latency_seconds,
            active_jobs,
            queue_depth,
            error_rate,
        })
    }

    pub fn increment_jobs_submitted(&self) {
        self.jobs_submitted_total.inc();
    }

    pub fn increment_jobs_completed(&self) {
        self.jobs_completed_total.inc();
    }

    pub fn increment_jobs_failed(&self) {
        self.jobs_failed_total.inc();
    }

    pub fn increment_jobs_drained(&self) {
        self.jobs_drained_total.inc();
    }

    pub fn record_job_duration(&self, duration: Duration) {
        self.job_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn increment_active_jobs(&self) {
        self.active_jobs.inc();
    }

    pub fn decrement_active_jobs(&self) {
        self.active_jobs.dec();
    }

    pub fn set_queue_depth(&self, depth: f64) {
        self.queue_depth.set(depth);
    }

    pub fn set_error_rate(&self, category: &str, rate: f64) {
        self.error_rate.with_label_values(&[category]).set(rate);
    }

    /// Records a successful run of a named step (`with_step`).
    pub fn record_step_success(&self, step: &str, duration: Duration) {
        self.step_success_total.with_label_values(&[step]).inc();
        self.step_duration_seconds.with_label_values(&[step]).observe(duration.as_secs_f64());
    }

    /// Records a failed run of a named step, tagged with the error category
    /// (`with_step`).
    pub fn record_step_failure(&self, step: &str, error_category: &str, duration: Duration) {
        self.step_failure_total.with_label_values(&[step, error_category]).inc();
        self.step_duration_seconds.with_label_values(&[step]).observe(duration.as_secs_f64());
    }

    /// Sets the in-flight gauge for a named semaphore (`with_semaphore`).
    pub fn set_semaphore_in_flight(&self, resource: &str, count: i64) {
        self.semaphore_in_flight.with_label_values(&[resource]).set(count);
    }

    /// Sets the queue-depth gauge for a named semaphore (`with_semaphore`).
    pub fn set_semaphore_queue_depth(&self, resource: &str, count: i64) {
        self.semaphore_queue_depth.with_label_values(&[resource]).set(count);
    }

    /// Records acquire-to-release latency for a named semaphore (`with_semaphore`).
    pub fn record_semaphore_latency(&self, resource: &str, duration: Duration) {
        self.semaphore_latency_seconds.with_label_values(&[resource]).observe(duration.as_secs_f64());
    }

    /// Get Prometheus metrics in text format for scraping
    pub fn get_metrics(&self) -> Result<String, WorkerError> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| WorkerError::internal_error(format!("failed to encode metrics: {e}")))
    }

    /// Get the Prometheus registry for advanced usage
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl Default for MetricsService {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new().expect("failed to create default MetricsService")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_creation_succeeds() {
        MetricsService::new().unwrap();
    }

    #[test]
    fn job_counters_appear_in_output() {
        let service = MetricsService::new().unwrap();
        service.increment_jobs_submitted();
        service.increment_jobs_completed();

        let output = service.get_metrics().unwrap();
        assert!(output.contains("episode_pipeline_jobs_submitted_total"));
        assert!(output.contains("episode_pipeline_jobs_completed_total"));
    }

    #[test]
    fn step_metrics_record_success_and_failure_separately() {
        let service = MetricsService::new().unwrap();
        service.record_step_success("download", Duration::from_secs(2));
        service.record_step_failure("transcode", "timeout", Duration::from_secs(1));

        let output = service.get_metrics().unwrap();
        assert!(output.contains("episode_pipeline_step_success_total"));
        assert!(output.contains("episode_pipeline_step_failure_total"));
        assert!(output.contains("timeout"));
    }

    #[test]
    fn semaphore_gauges_track_in_flight_and_queue_depth() {
        let service = MetricsService::new().unwrap();
        service.set_semaphore_in_flight("disk", 1);
        service.set_semaphore_queue_depth("disk", 3);
        service.record_semaphore_latency("disk", Duration::from_millis(250));

        let output = service.get_metrics().unwrap();
        assert!(output.contains("episode_pipeline_semaphore_in_flight"));
        assert!(output.contains("episode_pipeline_semaphore_queue_depth"));
        assert!(output.contains("episode_pipeline_semaphore_latency_seconds"));
    }

    #[test]
    fn active_jobs_gauge_increments_and_decrements() {
        let service = MetricsService::new().unwrap();
        service.increment_active_jobs();
        service.increment_active_jobs();
        service.decrement_active_jobs();

        let output = service.get_metrics().unwrap();
        assert!(output.contains("episode_pipeline_active_jobs"));
    }
}
