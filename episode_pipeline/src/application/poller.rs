// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Poller
//!
//! Long-polls the message queue, bounds in-flight work against
//! `MAX_CONCURRENT_JOBS`, and keeps each in-flight message's visibility
//! timeout renewed while its job runs (§4.6).

use std::sync::Arc;
use std::time::Duration;

use episode_pipeline_bootstrap::shutdown::CancellationToken;
use episode_pipeline_domain::entities::job::{EpisodeSeed, Job};
use episode_pipeline_domain::error::WorkerError;
use episode_pipeline_domain::services::{MessageQueue, QueuedMessage};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::orchestrator::PipelineOrchestrator;
use crate::application::JobTracker;
use crate::infrastructure::metrics::MetricsService;

/// One accepted queue-message shape (§6), discriminated by field presence.
#[derive(Debug, Deserialize)]
pub struct SubmitMessage {
    pub url: String,
    #[serde(rename = "channelName")]
    pub channel_name: Option<String>,
    #[serde(rename = "episodeTitle")]
    pub episode_title: Option<String>,
    #[serde(rename = "episodeId")]
    pub episode_id: Option<Uuid>,
    #[serde(rename = "forceReprocess", default)]
    pub force_reprocess: bool,
}

impl SubmitMessage {
    pub fn into_job(self, job_id: String) -> Result<Job, WorkerError> {
        let seed = if let Some(episode_id) = self.episode_id {
            EpisodeSeed::ByEpisodeId(episode_id)
        } else {
            let (channel_name, episode_title) = match (self.channel_name, self.episode_title) {
                (Some(c), Some(t)) => (c, t),
                _ => return Err(WorkerError::ValidationError("message needs either episodeId or channelName+episodeTitle".into())),
            };
            EpisodeSeed::ByChannelAndTitle { channel_name, episode_title }
        };

        Ok(Job::new(job_id, self.url, seed, self.force_reprocess))
    }
}

/// Visibility timeout the poller requests from the queue; extended at half
/// this interval by the per-message extender (§4.6, P6).
const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Poller {
    queue: Arc<dyn MessageQueue>,
    orchestrator: PipelineOrchestrator,
    metrics: MetricsService,
    tracker: JobTracker,
    poll_wait: Duration,
    poll_batch_size: u32,
}

impl Poller {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        orchestrator: PipelineOrchestrator,
        metrics: MetricsService,
        tracker: JobTracker,
        poll_wait: Duration,
        poll_batch_size: u32,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            metrics,
            tracker,
            poll_wait,
            poll_batch_size,
        }
    }

    /// Runs until `shutdown` is cancelled. On a drain signal this stops
    /// requesting new messages and waits out `grace` for in-flight jobs; any
    /// message whose job did not finish in time is left undeleted so the
    /// queue redelivers it.
    pub async fn run(&self, shutdown: CancellationToken, grace: Duration) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if self.tracker.is_at_capacity() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = self.tracker.wait_for_change() => continue,
                }
            }

            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.queue.receive_messages(self.poll_batch_size.min(10), self.poll_wait) => result,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(error = %err, "queue receive failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for message in messages {
                self.spawn_job(message, shutdown.clone());
            }
        }

        self.drain(grace).await;
    }

    fn spawn_job(&self, message: QueuedMessage, shutdown: CancellationToken) {
        self.tracker.begin_job();
        let queue = self.queue.clone();
        let orchestrator = self.orchestrator.clone();
        let metrics = self.metrics.clone();
        let tracker = self.tracker.clone();

        tokio::spawn(async move {
            let extender = spawn_visibility_extender(queue.clone(), message.receipt_handle.clone());

            let outcome = run_one_message(&message, &orchestrator, &metrics).await;
            extender.abort();

            match outcome {
                Ok(()) => {
                    if let Err(err) = queue.delete_message(&message.receipt_handle).await {
                        warn!(error = %err, "failed to delete processed message, will be redelivered");
                    }
                }
                Err(err) if err.is_fatal_downloader() => {
                    warn!(error = %err, "fatal downloader condition, leaving message for redelivery and signalling drain");
                    shutdown.cancel();
                }
                Err(err) => {
                    error!(error = %err, "job failed terminally, deleting message (error recorded on catalog)");
                    if let Err(delete_err) = queue.delete_message(&message.receipt_handle).await {
                        warn!(error = %delete_err, "failed to delete terminally-failed message");
                    }
                }
            }

            tracker.end_job();
        });
    }

    async fn drain(&self, grace: Duration) {
        info!("poller draining, waiting up to {grace:?} for in-flight jobs");
        let deadline = tokio::time::Instant::now() + grace;

        while self.tracker.active_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining = self.tracker.active_count(), "drain grace period expired, remaining jobs' messages will be redelivered");
                return;
            }
            tokio::select! {
                _ = self.tracker.wait_for_change() => {}
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            }
        }
        info!("poller drained cleanly");
    }
}

async fn run_one_message(message: &QueuedMessage, orchestrator: &PipelineOrchestrator, metrics: &MetricsService) -> Result<(), WorkerError> {
    metrics.increment_jobs_submitted();
    metrics.increment_active_jobs();
    let start = std::time::Instant::now();

    let submit: SubmitMessage = serde_json::from_str(&message.body).map_err(|e| WorkerError::ValidationError(format!("malformed queue message: {e}")))?;
    let job_id = Uuid::new_v4().to_string();
    let mut job = submit.into_job(job_id)?;

    let result = orchestrator.run(&mut job).await;

    metrics.record_job_duration(start.elapsed());
    metrics.decrement_active_jobs();
    match &result {
        Ok(()) => metrics.increment_jobs_completed(),
        Err(_) => metrics.increment_jobs_failed(),
    }

    result
}

fn spawn_visibility_extender(queue: Arc<dyn MessageQueue>, receipt_handle: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = VISIBILITY_TIMEOUT / 2;
        loop {
            tokio::time::sleep(interval).await;
            if let Err(err) = queue.change_message_visibility(&receipt_handle, VISIBILITY_TIMEOUT).await {
                warn!(error = %err, "failed to extend message visibility");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_message_requires_episode_id_or_channel_and_title() {
        let message = SubmitMessage {
            url: "https://example.com/v".into(),
            channel_name: None,
            episode_title: None,
            episode_id: None,
            force_reprocess: false,
        };
        assert!(message.into_job("job-1".into()).is_err());
    }

    #[test]
    fn submit_message_with_episode_id_builds_reprocess_seed() {
        let message = SubmitMessage {
            url: "https://example.com/v".into(),
            channel_name: None,
            episode_title: None,
            episode_id: Some(Uuid::nil()),
            force_reprocess: true,
        };
        let job = message.into_job("job-2".into()).unwrap();
        assert!(matches!(job.seed, EpisodeSeed::ByEpisodeId(_)));
        assert!(job.force_reprocess);
    }
}
