// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Surface
//!
//! `GET /health`, `POST /submit`, `GET /metrics` (§6). `/submit` builds the
//! same `Job` the poller builds from a queue message and runs it through the
//! same orchestrator, so the two entry points are indistinguishable past
//! this module.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::application::orchestrator::PipelineOrchestrator;
use crate::application::poller::SubmitMessage;
use crate::application::JobTracker;
use crate::infrastructure::metrics::MetricsService;

/// Flags flipped once their startup probe succeeds; `/health` is `200` only
/// once both are true (§6).
#[derive(Clone, Default)]
pub struct StartupProbes {
    catalog_ready: Arc<AtomicBool>,
    object_store_ready: Arc<AtomicBool>,
}

impl StartupProbes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_catalog_ready(&self) {
        self.catalog_ready.store(true, Ordering::SeqCst);
    }

    pub fn mark_object_store_ready(&self) {
        self.object_store_ready.store(true, Ordering::SeqCst);
    }

    fn ready(&self) -> bool {
        self.catalog_ready.load(Ordering::SeqCst) && self.object_store_ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct AppState {
    orchestrator: PipelineOrchestrator,
    metrics: MetricsService,
    tracker: JobTracker,
    probes: StartupProbes,
}

pub fn build_router(orchestrator: PipelineOrchestrator, metrics: MetricsService, tracker: JobTracker, probes: StartupProbes) -> Router {
    let state = AppState {
        orchestrator,
        metrics,
        tracker,
        probes,
    };

    Router::new()
        .route("/health", get(health))
        .route("/submit", post(submit))
        .route("/metrics", get(metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> StatusCode {
    if state.probes.ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[derive(Serialize)]
struct SubmitResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

async fn submit(State(state): State<AppState>, Json(body): Json<SubmitMessage>) -> Result<(StatusCode, Json<SubmitResponse>), StatusCode> {
    let job_id = Uuid::new_v4().to_string();
    let mut job = body.into_job(job_id.clone()).map_err(|_| StatusCode::BAD_REQUEST)?;

    let orchestrator = state.orchestrator.clone();
    let metrics = state.metrics.clone();
    let tracker = state.tracker.clone();

    tracker.begin_job();
    metrics.increment_jobs_submitted();
    metrics.increment_active_jobs();

    tokio::spawn(async move {
        let start = Instant::now();
        let result = orchestrator.run(&mut job).await;
        metrics.record_job_duration(start.elapsed());
        metrics.decrement_active_jobs();
        match &result {
            Ok(()) => metrics.increment_jobs_completed(),
            Err(err) => {
                metrics.increment_jobs_failed();
                error!(job_id = %job.job_id, error = %err, "submitted job failed");
            }
        }
        tracker.end_job();
    });

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.get_metrics().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_probes_are_not_ready_until_both_flip() {
        let probes = StartupProbes::new();
        assert!(!probes.ready());
        probes.mark_catalog_ready();
        assert!(!probes.ready());
        probes.mark_object_store_ready();
        assert!(probes.ready());
    }
}
