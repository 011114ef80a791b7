// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! Orchestrates the domain's port traits against a single job: the pipeline
//! state machine, the queue poller, the enrichment side-path, the
//! post-pipeline validator, and the platform-protection controller (§4.6-§4.10).

pub mod enrichment_orchestrator;
pub mod orchestrator;
pub mod platform_protection;
pub mod poller;
pub mod validator;

pub use enrichment_orchestrator::EnrichmentOrchestrator;
pub use orchestrator::PipelineOrchestrator;
pub use platform_protection::{CapacityMode, PlatformProtectionController};
pub use poller::Poller;
pub use validator::{EpisodeValidator, ValidationReport};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Tracks the number of jobs currently running, shared between the poller
/// (which bounds intake against `MAX_CONCURRENT_JOBS`) and the
/// platform-protection controller (which keys protection on "any job active").
#[derive(Clone)]
pub struct JobTracker {
    active: Arc<AtomicUsize>,
    limit: usize,
    changed: Arc<Notify>,
}

impl JobTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            limit,
            changed: Arc::new(Notify::new()),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_at_capacity(&self) -> bool {
        self.active_count() >= self.limit
    }

    pub fn begin_job(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub fn end_job(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Resolves once the active count changes, for callers that poll on a
    /// timer anyway (platform protection) rather than blocking indefinitely.
    pub async fn wait_for_change(&self) {
        self.changed.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_reports_capacity_once_limit_reached() {
        let tracker = JobTracker::new(2);
        assert!(!tracker.is_at_capacity());
        tracker.begin_job();
        assert!(!tracker.is_at_capacity());
        tracker.begin_job();
        assert!(tracker.is_at_capacity());
        tracker.end_job();
        assert!(!tracker.is_at_capacity());
    }
}
