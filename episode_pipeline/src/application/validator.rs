// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Episode Validator
//!
//! Post-pipeline integrity check (§4.8): catalog field completeness, blob
//! existence, and rendition-duration tolerance against the source metadata.
//! Runs at the end of every pipeline invocation and on a standalone
//! `validate` entry point for after-the-fact audits.

use std::sync::Arc;

use episode_pipeline_domain::entities::EpisodeRecord;
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::{Catalog, ObjectStore};
use episode_pipeline_domain::value_objects::artifact_key::{ArtifactKey, ArtifactKind};
use tracing::warn;
use uuid::Uuid;

/// Tolerance applied to manifest-derived duration vs. catalog duration:
/// whichever is larger of a flat 2s or 1% of the source duration (§4.8).
fn duration_tolerance_millis(source_duration_millis: i64) -> i64 {
    (2_000).max(source_duration_millis / 100)
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub episode_id: Uuid,
    pub passed: bool,
    pub problems: Vec<String>,
}

pub struct EpisodeValidator {
    catalog: Arc<dyn Catalog>,
    object_store: Arc<dyn ObjectStore>,
}

impl EpisodeValidator {
    pub fn new(catalog: Arc<dyn Catalog>, object_store: Arc<dyn ObjectStore>) -> Self {
        Self { catalog, object_store }
    }

    pub async fn validate(&self, episode_id: Uuid) -> WorkerResult<ValidationReport> {
        let record = self
            .catalog
            .find_by_episode_id(episode_id)
            .await?
            .ok_or_else(|| WorkerError::ValidationError(format!("episode {episode_id} not found in catalog")))?;

        let mut problems = Vec::new();

        if !record.passes_field_checks() {
            problems.push("catalog field checks failed (title/channel/duration/uri/processing_done)".to_string());
        }

        self.check_blobs_exist(&record, &mut problems).await;
        self.check_manifest_duration(&record, &mut problems).await;

        Ok(ValidationReport {
            episode_id,
            passed: problems.is_empty(),
            problems,
        })
    }

    async fn check_blobs_exist(&self, record: &EpisodeRecord, problems: &mut Vec<String>) {
        let keys = [
            ArtifactKey::new(&record.channel_name, &record.episode_title, ArtifactKind::Audio, "audio.m4a").as_key(),
            ArtifactKey::new(&record.channel_name, &record.episode_title, ArtifactKind::Videos, "merged.mp4").as_key(),
            ArtifactKey::new(&record.channel_name, &record.episode_title, ArtifactKind::VideoStream, "master.m3u8").as_key(),
        ];

        for key in keys {
            match self.object_store.head_object(&key).await {
                Ok(Some(_)) => {}
                Ok(None) => problems.push(format!("expected blob missing: {key}")),
                Err(err) => {
                    warn!(error = %err, key, "head_object failed during validation, treating as unverified");
                    problems.push(format!("could not verify blob existence: {key}"));
                }
            }
        }
    }

    /// Sums the `#EXTINF` runs of the top rendition's media playlist and
    /// compares that derived duration against the catalog's source duration,
    /// within `duration_tolerance_millis` (§4.8).
    async fn check_manifest_duration(&self, record: &EpisodeRecord, problems: &mut Vec<String>) {
        let manifest_key = ArtifactKey::new(&record.channel_name, &record.episode_title, ArtifactKind::VideoStream, "master.m3u8").as_key();

        let bytes = match self.object_store.get_object_ranged(&manifest_key, 0..4096).await {
            Ok(bytes) => bytes,
            Err(err) => {
                problems.push(format!("could not read manifest for duration check: {err}"));
                return;
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        if !text.contains("#EXTM3U") {
            problems.push("master manifest does not start with #EXTM3U".to_string());
            return;
        }

        if record.duration_millis <= 0 {
            problems.push("source duration is non-positive, cannot verify manifest duration tolerance".to_string());
            return;
        }

        let Some(rendition_playlist) = text.lines().find(|line| !line.is_empty() && !line.starts_with('#')) else {
            problems.push("master manifest names no rendition playlist".to_string());
            return;
        };

        let rendition_key = match manifest_key.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{rendition_playlist}"),
            None => rendition_playlist.to_string(),
        };

        let rendition_bytes = match self.object_store.get_object_ranged(&rendition_key, 0..65_536).await {
            Ok(bytes) => bytes,
            Err(err) => {
                problems.push(format!("could not read rendition playlist {rendition_key} for duration check: {err}"));
                return;
            }
        };
        let rendition_text = String::from_utf8_lossy(&rendition_bytes);

        let derived_seconds: f64 = rendition_text
            .lines()
            .filter_map(|line| line.strip_prefix("#EXTINF:"))
            .filter_map(|rest| rest.split(',').next())
            .filter_map(|n| n.parse::<f64>().ok())
            .sum();

        if derived_seconds <= 0.0 {
            problems.push(format!("rendition playlist {rendition_key} has no #EXTINF duration to compare"));
            return;
        }

        let derived_millis = (derived_seconds * 1000.0).round() as i64;
        let tolerance = duration_tolerance_millis(record.duration_millis);
        let delta = (derived_millis - record.duration_millis).abs();
        if delta > tolerance {
            problems.push(format!(
                "rendition duration {derived_millis}ms differs from source duration {}ms by {delta}ms, exceeding tolerance {tolerance}ms",
                record.duration_millis
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_uses_the_larger_of_flat_and_percentage() {
        assert_eq!(duration_tolerance_millis(60_000), 2_000);
        assert_eq!(duration_tolerance_millis(1_000_000), 10_000);
    }
}
