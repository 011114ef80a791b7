// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform-Protection Controller
//!
//! Prevents the host from being reclaimed mid-job on interruptible capacity
//! (§4.10). Capacity mode is resolved once at startup and does not change
//! for the process lifetime.

use std::time::Duration;

use episode_pipeline_bootstrap::shutdown::ShutdownCoordinator;
use tracing::{info, warn};

use crate::application::JobTracker;

/// Resolved once at startup from an env var / instance metadata probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMode {
    /// Stable capacity: hold scale-in protection while any job is active.
    OnDemand,
    /// Interruptible capacity: subscribe to interruption notices instead.
    Preemptible,
}

impl CapacityMode {
    /// Reads `CAPACITY_MODE` (`on-demand` default, `preemptible` opts in).
    pub fn from_env() -> Self {
        match std::env::var("CAPACITY_MODE").as_deref() {
            Ok("preemptible") => Self::Preemptible,
            _ => Self::OnDemand,
        }
    }
}

/// Abstracts the platform operations the controller needs, so tests can
/// substitute an in-memory fake instead of a real cloud API.
#[async_trait::async_trait]
pub trait CapacityPlatform: Send + Sync {
    async fn set_scale_in_protection(&self, enabled: bool) -> Result<(), String>;

    /// Polls for a pending interruption notice (e.g. spot reclaim), returning
    /// the grace window before reclaim if one is pending.
    async fn poll_interruption_notice(&self) -> Option<Duration>;
}

pub struct PlatformProtectionController<P: CapacityPlatform> {
    platform: P,
    tracker: JobTracker,
    mode: CapacityMode,
    poll_interval: Duration,
}

impl<P: CapacityPlatform> PlatformProtectionController<P> {
    pub fn new(platform: P, tracker: JobTracker, mode: CapacityMode, poll_interval: Duration) -> Self {
        Self { platform, tracker, mode, poll_interval }
    }

    /// Runs until `shutdown` is cancelled (on-demand mode) or until an
    /// interruption notice triggers a drain (preemptible mode), in which
    /// case it initiates shutdown itself and returns.
    pub async fn run(&self, shutdown: &ShutdownCoordinator) {
        match self.mode {
            CapacityMode::OnDemand => self.run_on_demand(shutdown).await,
            CapacityMode::Preemptible => self.run_preemptible(shutdown).await,
        }
    }

    async fn run_on_demand(&self, shutdown: &ShutdownCoordinator) {
        let mut protected = false;
        let token = shutdown.token();

        loop {
            if token.is_cancelled() {
                break;
            }

            let should_protect = self.tracker.active_count() >= 1;
            if should_protect != protected {
                if let Err(err) = self.platform.set_scale_in_protection(should_protect).await {
                    warn!(error = %err, should_protect, "failed to update scale-in protection");
                } else {
                    protected = should_protect;
                    info!(protected, "scale-in protection updated");
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        if protected {
            let _ = self.platform.set_scale_in_protection(false).await;
        }
    }

    async fn run_preemptible(&self, shutdown: &ShutdownCoordinator) {
        let token = shutdown.token();
        loop {
            if token.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                notice = self.platform.poll_interruption_notice() => {
                    if let Some(grace) = notice {
                        warn!(grace_secs = grace.as_secs(), "interruption notice received, initiating drain");
                        shutdown.initiate_shutdown();
                        break;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakePlatform {
        protected: Arc<AtomicBool>,
        notice_after: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl CapacityPlatform for FakePlatform {
        async fn set_scale_in_protection(&self, enabled: bool) -> Result<(), String> {
            self.protected.store(enabled, Ordering::SeqCst);
            Ok(())
        }

        async fn poll_interruption_notice(&self) -> Option<Duration> {
            self.notice_after
        }
    }

    #[test]
    fn capacity_mode_defaults_to_on_demand() {
        std::env::remove_var("CAPACITY_MODE");
        assert_eq!(CapacityMode::from_env(), CapacityMode::OnDemand);
    }

    #[tokio::test]
    async fn on_demand_protects_while_a_job_is_active_then_releases() {
        let protected = Arc::new(AtomicBool::new(false));
        let platform = FakePlatform {
            protected: protected.clone(),
            notice_after: None,
        };
        let tracker = JobTracker::new(4);
        tracker.begin_job();

        let controller = PlatformProtectionController::new(platform, tracker.clone(), CapacityMode::OnDemand, Duration::from_millis(20));
        let shutdown = ShutdownCoordinator::new(Duration::from_millis(200));

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            shutdown_clone.initiate_shutdown();
        });

        controller.run(&shutdown).await;
        assert!(!protected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn preemptible_drains_on_interruption_notice() {
        let platform = FakePlatform {
            protected: Arc::new(AtomicBool::new(false)),
            notice_after: Some(Duration::from_secs(30)),
        };
        let tracker = JobTracker::new(4);
        let controller = PlatformProtectionController::new(platform, tracker, CapacityMode::Preemptible, Duration::from_millis(20));
        let shutdown = ShutdownCoordinator::new(Duration::from_millis(200));

        controller.run(&shutdown).await;
        assert!(shutdown.is_shutting_down());
    }
}
