// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Concurrency Kernel
//!
//! Bounded, observable concurrency primitives shared across every adapter
//! (§4.1): four named semaphores (`disk`, `io`, `http`, `db`), a
//! `with_semaphore` wrapper recording in-flight/queue/latency metrics, a
//! `with_retry` geometric-backoff helper that short-circuits on
//! non-retryable error classes, and a `with_step` wrapper recording
//! success/failure/duration per named pipeline step.
//!
//! Generalizes the teacher's two-semaphore (`cpu`, `io`) global resource
//! manager to four semaphores and folds in container-quota-aware CPU
//! detection.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use episode_pipeline_domain::error::WorkerError;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

use crate::infrastructure::metrics::service::MetricsService;

/// Which of the four named semaphores a call acquires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLabel {
    Disk,
    Io,
    Http,
    Db,
}

impl ResourceLabel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Io => "io",
            Self::Http => "http",
            Self::Db => "db",
        }
    }
}

/// Detects CPU cores available to this process, honoring container quota.
///
/// Tries cgroup v2's `cpu.max`, then cgroup v1's `cpu.cfs_quota_us` /
/// `cpu.cfs_period_us` pair, then an explicit override, then falls back to
/// `std::thread::available_parallelism()`.
pub fn detect_effective_cores(override_cores: Option<usize>) -> usize {
    if let Some(quota) = read_cgroup_v2_quota() {
        return quota.max(1);
    }
    if let Some(quota) = read_cgroup_v1_quota() {
        return quota.max(1);
    }
    if let Some(n) = override_cores {
        return n.max(1);
    }
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

fn read_cgroup_v2_quota() -> Option<usize> {
    let contents = std::fs::read_to_string("/sys/fs/cgroup/cpu.max").ok()?;
    let mut parts = contents.split_whitespace();
    let quota = parts.next()?;
    let period = parts.next()?;
    if quota == "max" {
        return None;
    }
    let quota: f64 = quota.parse().ok()?;
    let period: f64 = period.parse().ok()?;
    if period <= 0.0 {
        return None;
    }
    Some((quota / period).ceil() as usize)
}

fn read_cgroup_v1_quota() -> Option<usize> {
    let quota: i64 = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")
        .ok()?
        .trim()
        .parse()
        .ok()?;
    if quota <= 0 {
        return None;
    }
    let period: i64 = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_period_us")
        .ok()?
        .trim()
        .parse()
        .ok()?;
    if period <= 0 {
        return None;
    }
    Some(((quota as f64) / (period as f64)).ceil() as usize)
}

/// Configuration for the four named semaphores, derived from `WorkerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub disk_limit: usize,
    pub io_limit: usize,
    pub http_limit: usize,
    pub db_limit: usize,
}

impl KernelConfig {
    /// Builds the default limits from detected cores, matching §4.1's
    /// greedy-per-job default (`disk_semaphore=1`) unless a non-default
    /// override arrived from `WorkerConfig`.
    pub fn from_cores(cores: usize, overrides: DisplacedLimits) -> Self {
        Self {
            disk_limit: overrides.disk.unwrap_or(1),
            io_limit: overrides.io.unwrap_or_else(|| (cores * 2).max(4)),
            http_limit: overrides.http.unwrap_or(16),
            db_limit: overrides.db.unwrap_or(8),
        }
    }
}

/// Explicit per-semaphore overrides, read from the worker's environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplacedLimits {
    pub disk: Option<usize>,
    pub io: Option<usize>,
    pub http: Option<usize>,
    pub db: Option<usize>,
}

struct NamedSemaphore {
    inner: Semaphore,
    in_flight: AtomicI64,
    queued: AtomicI64,
}

impl NamedSemaphore {
    fn new(limit: usize) -> Self {
        Self {
            inner: Semaphore::new(limit),
            in_flight: AtomicI64::new(0),
            queued: AtomicI64::new(0),
        }
    }

    async fn acquire(&self) -> SemaphorePermit<'_> {
        self.queued.fetch_add(1, Ordering::Relaxed);
        let permit = self.inner.acquire().await.expect("semaphore never closed");
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        permit
    }
}

/// Process-wide concurrency kernel: four semaphores plus retry/step helpers.
pub struct ConcurrencyKernel {
    disk: NamedSemaphore,
    io: NamedSemaphore,
    http: NamedSemaphore,
    db: NamedSemaphore,
    metrics: MetricsService,
}

impl ConcurrencyKernel {
    pub fn new(config: KernelConfig, metrics: MetricsService) -> Self {
        Self {
            disk: NamedSemaphore::new(config.disk_limit),
            io: NamedSemaphore::new(config.io_limit),
            http: NamedSemaphore::new(config.http_limit),
            db: NamedSemaphore::new(config.db_limit),
            metrics,
        }
    }

    fn semaphore(&self, label: ResourceLabel) -> &NamedSemaphore {
        match label {
            ResourceLabel::Disk => &self.disk,
            ResourceLabel::Io => &self.io,
            ResourceLabel::Http => &self.http,
            ResourceLabel::Db => &self.db,
        }
    }

    /// Runs `f` under the named semaphore, recording in-flight/queue-depth
    /// gauges, a success/failure counter, and latency. The acquire itself is
    /// never cancelled mid-operation (§4.1).
    pub async fn with_semaphore<T, E, F, Fut>(&self, label: ResourceLabel, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let sem = self.semaphore(label);
        self.metrics.set_semaphore_queue_depth(label.as_str(), sem.queued.load(Ordering::Relaxed));
        let _permit = sem.acquire().await;
        self.metrics.set_semaphore_in_flight(label.as_str(), sem.in_flight.load(Ordering::Relaxed));

        let start = Instant::now();
        let result = f().await;
        sem.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.metrics.set_semaphore_in_flight(label.as_str(), sem.in_flight.load(Ordering::Relaxed));
        self.metrics.record_semaphore_latency(label.as_str(), start.elapsed());

        result
    }

    /// Runs `f`, measuring wall time and emitting success/failure/duration
    /// metrics tagged with `name` (§4.1 `with_step`).
    pub async fn with_step<T, F, Fut>(&self, name: &str, f: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WorkerError>>,
    {
        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => self.metrics.record_step_success(name, elapsed),
            Err(err) => self.metrics.record_step_failure(name, err.category(), elapsed),
        }

        result
    }
}

/// Geometric-backoff retry helper (§4.1 `with_retry`). Short-circuits as soon
/// as `is_retryable` returns false, and after `attempts` exhausted tries.
pub async fn with_retry<T, F, Fut>(attempts: u32, base_delay: Duration, multiplier: u32, mut f: F) -> Result<T, WorkerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WorkerError>>,
{
    let mut delay = base_delay;
    let mut last_err = None;

    for attempt in 1..=attempts.max(1) {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                if attempt == attempts {
                    last_err = Some(err);
                    break;
                }
                warn!(attempt, category = err.category(), delay_ms = delay.as_millis() as u64, "retrying after failure");
                last_err = Some(err);
                tokio::time::sleep(delay).await;
                delay *= multiplier;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| WorkerError::internal_error("with_retry exhausted with no recorded error")))
}

static KERNEL_CELL: OnceLock<ConcurrencyKernel> = OnceLock::new();

/// Initializes the process-wide concurrency kernel. Must be called exactly
/// once, early in `main()`.
pub fn init_concurrency_kernel(config: KernelConfig, metrics: MetricsService) -> Result<(), String> {
    KERNEL_CELL
        .set(ConcurrencyKernel::new(config, metrics))
        .map_err(|_| "concurrency kernel already initialized".to_string())
}

/// Accesses the process-wide concurrency kernel.
///
/// # Panics
///
/// Panics if called before `init_concurrency_kernel()`.
pub fn concurrency_kernel() -> &'static ConcurrencyKernel {
    KERNEL_CELL.get().expect("concurrency kernel not initialized! call init_concurrency_kernel() in main()")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn test_kernel() -> ConcurrencyKernel {
        ConcurrencyKernel::new(
            KernelConfig {
                disk_limit: 2,
                io_limit: 2,
                http_limit: 2,
                db_limit: 2,
            },
            MetricsService::new().unwrap(),
        )
    }

    #[tokio::test]
    async fn with_semaphore_runs_closure_and_releases_permit() {
        let kernel = test_kernel();
        let result: Result<i32, WorkerError> = kernel.with_semaphore(ResourceLabel::Disk, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn with_retry_stops_on_first_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry(3, Duration::from_millis(1), 2, move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<_, WorkerError>(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retry_short_circuits_on_non_retryable_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<(), WorkerError> = with_retry(3, Duration::from_millis(1), 2, move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WorkerError::ValidationError("bad input".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retry_exhausts_attempts_on_persistent_retryable_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<(), WorkerError> = with_retry(3, Duration::from_millis(1), 2, move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WorkerError::download_error("connection reset"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn default_limits_are_greedy_per_job_for_disk() {
        let config = KernelConfig::from_cores(8, DisplacedLimits::default());
        assert_eq!(config.disk_limit, 1);
        assert_eq!(config.io_limit, 16);
    }

    #[test]
    fn explicit_overrides_win_over_defaults() {
        let config = KernelConfig::from_cores(
            8,
            DisplacedLimits {
                disk: Some(4),
                ..Default::default()
            },
        );
        assert_eq!(config.disk_limit, 4);
    }

    #[test]
    fn detect_effective_cores_never_returns_zero() {
        assert!(detect_effective_cores(None) >= 1);
        assert!(detect_effective_cores(Some(0)) >= 1);
    }
}
