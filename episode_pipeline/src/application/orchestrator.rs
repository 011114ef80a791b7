// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Orchestrator
//!
//! The per-job state machine (§4.7): `pending -> fetching-metadata ->
//! extracting-guests -> downloading -> merging -> uploading -> transcoding ->
//! completed`, with a side `error` state reachable from any stage. Drives the
//! six domain ports through the concurrency kernel; holds no I/O of its own.

use std::path::Path;
use std::sync::Arc;

use episode_pipeline_bootstrap::config::{TopEdition, WorkerConfig};
use episode_pipeline_domain::entities::episode_record::{additional_data_keys, EpisodeRecordPatch};
use episode_pipeline_domain::entities::job::{EpisodeSeed, Job, JobStatus};
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::{Catalog, DownloaderTool, Enricher, ObjectStore, TranscoderTool};
use episode_pipeline_domain::value_objects::artifact_key::ArtifactKind;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::enrichment_orchestrator::EnrichmentOrchestrator;
use crate::runtime::concurrency_kernel::{concurrency_kernel, ResourceLabel};

/// Wires the six domain ports together for one job at a time. Cheap to
/// clone: every field is an `Arc` or plain config.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    downloader: Arc<dyn DownloaderTool>,
    transcoder: Arc<dyn TranscoderTool>,
    object_store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn Catalog>,
    enrichment: EnrichmentOrchestrator,
    preferred_audio_format: String,
    top_edition: u32,
}

impl PipelineOrchestrator {
    pub fn new(
        downloader: Arc<dyn DownloaderTool>,
        transcoder: Arc<dyn TranscoderTool>,
        object_store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn Catalog>,
        enricher: Arc<dyn Enricher>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            downloader,
            transcoder,
            object_store,
            catalog,
            enrichment: EnrichmentOrchestrator::new(enricher),
            preferred_audio_format: config.preferred_audio_format.clone(),
            top_edition: match config.top_edition {
                TopEdition::P720 => 720,
                TopEdition::P1080 => 1080,
            },
        }
    }

    /// Runs one job to completion or to its `error` state. Never panics on
    /// pipeline failure; the error is recorded on `job` and returned so the
    /// poller can decide whether to requeue or delete the source message.
    pub async fn run(&self, job: &mut Job) -> WorkerResult<()> {
        let tmp_dir = tempfile::tempdir().map_err(|e| WorkerError::internal_error(format!("failed to create job tmp dir: {e}")))?;

        let result = self.run_inner(job, tmp_dir.path()).await;

        if let Err(err) = &result {
            job.fail(err.to_string());
            self.record_failure_best_effort(job, err).await;
        }

        result
    }

    async fn run_inner(&self, job: &mut Job, tmp_dir: &Path) -> WorkerResult<()> {
        let kernel = concurrency_kernel();

        job.transition(JobStatus::FetchingMetadata);
        let metadata = kernel
            .with_step("fetching-metadata", || {
                let downloader = self.downloader.clone();
                let url = job.source_url.clone();
                async move { kernel.with_semaphore(ResourceLabel::Http, || async { downloader.fetch_metadata(&url).await }).await }
            })
            .await?;

        // `ByEpisodeId` reopens a row the caller already named; it must never
        // run through `find_or_create` again, which only knows the
        // title/channel and youtube-id keys and would insert a duplicate.
        let (episode_id, created, channel_name, episode_title, existing_record) = match &job.seed {
            EpisodeSeed::ByEpisodeId(episode_id) => {
                let episode_id = *episode_id;
                let existing = self
                    .catalog
                    .find_by_episode_id(episode_id)
                    .await?
                    .ok_or_else(|| WorkerError::ValidationError(format!("no episode row for episode id {episode_id}")))?;
                let channel_name = existing.channel_name.clone();
                let episode_title = existing.episode_title.clone();
                (episode_id, false, channel_name, episode_title, Some(existing))
            }
            EpisodeSeed::ByChannelAndTitle { channel_name, episode_title } => {
                let channel_name = channel_name.clone();
                let episode_title = episode_title.clone();
                let youtube_video_id = metadata.identifier.clone();
                let (episode_id, created) = kernel
                    .with_step("catalog-find-or-create", || {
                        let catalog = self.catalog.clone();
                        let channel_name = channel_name.clone();
                        let episode_title = episode_title.clone();
                        let url = job.source_url.clone();
                        let youtube_video_id = youtube_video_id.clone();
                        async move { catalog.find_or_create(&channel_name, &episode_title, &url, Some(&youtube_video_id)).await }
                    })
                    .await?;
                (episode_id, created, channel_name, episode_title, None)
            }
        };
        job.episode_id = Some(episode_id);

        if !created && !job.force_reprocess {
            let existing = match existing_record {
                Some(record) => Some(record),
                None => self.catalog.find_by_episode_id(episode_id).await?,
            };
            if let Some(existing) = existing {
                if existing.processing_done {
                    info!(episode_id = %episode_id, "episode already processed, short-circuiting");
                    job.transition(JobStatus::Completed);
                    return Ok(());
                }
            }
        }

        if !created && job.force_reprocess {
            self.catalog.reopen_for_reprocess(episode_id).await?;
        }

        job.transition(JobStatus::ExtractingGuests);
        let enrichment_future = self.enrichment.enrich(&metadata.title, &metadata.description);

        job.transition(JobStatus::Downloading);
        let download_future = self.download_legs(job, &metadata, tmp_dir);

        let (enrichment_outcome, (audio_path, video_path)) = tokio::join!(enrichment_future, download_future);
        let (audio_path, video_path) = (audio_path?, video_path?);

        let audio_key = self.upload_artifact(&channel_name, &episode_title, ArtifactKind::Audio, &audio_path).await?;

        self.catalog
            .update_stage(
                episode_id,
                EpisodeRecordPatch {
                    episode_uri: Some(self.object_store.public_url(&audio_key)),
                    ..Default::default()
                },
            )
            .await?;

        job.transition(JobStatus::Merging);
        let merged_path = tmp_dir.join("merged.mp4");
        kernel
            .with_step("merging", || {
                let downloader = self.downloader.clone();
                let video_path = video_path.clone();
                let audio_path = audio_path.clone();
                let merged_path = merged_path.clone();
                async move {
                    kernel
                        .with_semaphore(ResourceLabel::Disk, || async { downloader.mux_audio_video(&video_path, &audio_path, &merged_path).await })
                        .await
                }
            })
            .await?;

        job.transition(JobStatus::Uploading);
        let video_key = self.upload_artifact(&channel_name, &episode_title, ArtifactKind::Videos, &merged_path).await?;

        job.transition(JobStatus::Transcoding);
        let ladder = kernel
            .with_step("transcoding", || {
                let transcoder = self.transcoder.clone();
                let merged_path = merged_path.clone();
                let tmp_dir = tmp_dir.to_path_buf();
                let top_edition = self.top_edition;
                async move {
                    kernel
                        .with_semaphore(ResourceLabel::Disk, || async { transcoder.build_rendition_ladder(&merged_path, top_edition, &tmp_dir).await })
                        .await
                }
            })
            .await?;

        for rendition in &ladder.renditions {
            let media_key = episode_pipeline_domain::value_objects::artifact_key::ArtifactKey::new(
                &channel_name,
                &episode_title,
                ArtifactKind::VideoStream,
                format!("{}p/{}p.mp4", rendition.height, rendition.height),
            );
            self.upload_path(&media_key.as_key(), &rendition.media_path).await?;

            let playlist_key = episode_pipeline_domain::value_objects::artifact_key::ArtifactKey::new(
                &channel_name,
                &episode_title,
                ArtifactKind::VideoStream,
                format!("{}p/{}p.m3u8", rendition.height, rendition.height),
            );
            self.upload_path(&playlist_key.as_key(), &rendition.playlist_path).await?;
        }
        let manifest_key =
            episode_pipeline_domain::value_objects::artifact_key::ArtifactKey::new(&channel_name, &episode_title, ArtifactKind::VideoStream, "master.m3u8");
        self.upload_path(&manifest_key.as_key(), &ladder.master_manifest_path).await?;

        let enrichment_outcome = enrichment_outcome?;

        self.catalog
            .update_stage(
                episode_id,
                EpisodeRecordPatch {
                    duration_millis: Some((metadata.duration_secs * 1000) as i64),
                    processing_done: Some(true),
                    guests: Some(enrichment_outcome.guests.clone()),
                    guest_descriptions: Some(enrichment_outcome.guest_descriptions.clone()),
                    topics: Some(enrichment_outcome.topics.clone()),
                    additional_data: [
                        (additional_data_keys::MASTER_M3U8.to_string(), json!(self.object_store.public_url(&manifest_key.as_key()))),
                        (additional_data_keys::VIDEO_LOCATION.to_string(), json!(self.object_store.public_url(&video_key))),
                        (additional_data_keys::GUEST_ENRICHMENT.to_string(), json!(enrichment_outcome.guest_provenance)),
                        (additional_data_keys::TOPIC_ENRICHMENT.to_string(), json!(enrichment_outcome.topic_provenance)),
                    ]
                    .into_iter()
                    .collect(),
                    ..Default::default()
                },
            )
            .await?;

        job.transition(JobStatus::Completed);
        Ok(())
    }

    async fn download_legs(
        &self,
        job: &Job,
        metadata: &episode_pipeline_domain::entities::VideoMetadata,
        tmp_dir: &Path,
    ) -> WorkerResult<(std::path::PathBuf, std::path::PathBuf)> {
        let kernel = concurrency_kernel();
        let url = job.source_url.clone();

        let audio = {
            let downloader = self.downloader.clone();
            let url = url.clone();
            let tmp_dir = tmp_dir.to_path_buf();
            let metadata = metadata.clone();
            async move {
                kernel
                    .with_semaphore(ResourceLabel::Http, || async { downloader.download_audio(&url, &tmp_dir, Some(&metadata), None).await })
                    .await
            }
        };

        let video = {
            let downloader = self.downloader.clone();
            let tmp_dir = tmp_dir.to_path_buf();
            let metadata = metadata.clone();
            let top_edition = self.top_edition;
            async move {
                kernel
                    .with_semaphore(ResourceLabel::Http, || async {
                        downloader.download_video_no_audio(&url, &tmp_dir, top_edition, Some(&metadata), None).await
                    })
                    .await
            }
        };

        let (audio_path, video_path) = tokio::join!(audio, video);
        Ok((audio_path?, video_path?))
    }

    async fn upload_artifact(&self, channel_name: &str, episode_title: &str, kind: ArtifactKind, path: &Path) -> WorkerResult<String> {
        let key = episode_pipeline_domain::value_objects::artifact_key::ArtifactKey::new(
            channel_name,
            episode_title,
            kind,
            path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| "artifact".to_string()),
        );
        self.upload_path(&key.as_key(), path).await?;
        Ok(key.as_key())
    }

    async fn upload_path(&self, key: &str, path: &Path) -> WorkerResult<()> {
        let kernel = concurrency_kernel();
        let object_store = self.object_store.clone();
        let path = path.to_path_buf();
        let key = key.to_string();
        kernel
            .with_semaphore(ResourceLabel::Http, || async move { object_store.put_object_multipart(&path, &key, 32 * 1024 * 1024).await })
            .await
    }

    async fn record_failure_best_effort(&self, job: &Job, err: &WorkerError) {
        let Some(episode_id) = job.episode_id else {
            warn!(error = %err, "job failed before an episode id was assigned; nothing to record on the catalog");
            return;
        };

        let patch = EpisodeRecordPatch {
            additional_data: [(additional_data_keys::VIDEO_DOWNLOAD_ERROR.to_string(), json!(err.to_string()))].into_iter().collect(),
            ..Default::default()
        };

        if let Err(write_err) = self.catalog.update_stage(episode_id, patch).await {
            error!(episode_id = %episode_id, original_error = %err, write_error = %write_err, "failed to record pipeline error on catalog");
        }
    }
}

/// Whether an episode id is the caller-supplied reprocessing seed, used by
/// the poller to decide whether `find_or_create` needs a channel/title seed.
pub fn requires_metadata_seed(seed: &EpisodeSeed) -> bool {
    matches!(seed, EpisodeSeed::ByChannelAndTitle { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_channel_and_title_requires_metadata_seed() {
        let seed = EpisodeSeed::ByChannelAndTitle {
            channel_name: "Chan".into(),
            episode_title: "Ep".into(),
        };
        assert!(requires_metadata_seed(&seed));
    }

    #[test]
    fn by_episode_id_does_not_require_metadata_seed() {
        let seed = EpisodeSeed::ByEpisodeId(Uuid::nil());
        assert!(!requires_metadata_seed(&seed));
    }
}
