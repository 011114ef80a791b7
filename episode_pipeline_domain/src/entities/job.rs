//! The in-process work unit owned exclusively by the pipeline orchestrator (§3).

use crate::entities::progress::ProgressSnapshot;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle states of a `Job`. A side `Error` state is reachable from any
/// other state (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    FetchingMetadata,
    ExtractingGuests,
    Downloading,
    Merging,
    Uploading,
    Transcoding,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingMetadata => "fetching-metadata",
            Self::ExtractingGuests => "extracting-guests",
            Self::Downloading => "downloading",
            Self::Merging => "merging",
            Self::Uploading => "uploading",
            Self::Transcoding => "transcoding",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Caller-supplied identity seed. The queue accepts three message shapes
/// (§6); the existing-episode-enrichment shape (`{id, url}`) maps to
/// `ByEpisodeId`, and both the new-entry (`{videoId, episodeTitle,
/// originalUri, ...}`) and legacy (`{url, jobId?, channelId?}`) shapes map to
/// `ByChannelAndTitle` — they differ only in whether a `videoId` is already
/// known, which is threaded separately into `find_or_create`'s
/// `youtube_video_id` argument once metadata fetch supplies or confirms it.
#[derive(Debug, Clone)]
pub enum EpisodeSeed {
    /// New-entry or legacy ingestion: channel/title seed `find_or_create`
    /// ahead of metadata.
    ByChannelAndTitle {
        channel_name: String,
        episode_title: String,
    },
    /// Existing-episode enrichment: reopens a known catalog row directly by
    /// id rather than re-deriving a title/channel key.
    ByEpisodeId(Uuid),
}

/// The work unit. Created on submit/ingest, mutated only by the owning
/// pipeline invocation, destroyed when the process exits or on explicit
/// delete. Lives only in process memory.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub source_url: String,
    pub seed: EpisodeSeed,
    pub force_reprocess: bool,
    pub status: JobStatus,
    pub episode_id: Option<Uuid>,
    pub progress: ProgressSnapshot,
    pub error_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_id: String, source_url: String, seed: EpisodeSeed, force_reprocess: bool) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            source_url,
            seed,
            force_reprocess,
            status: JobStatus::Pending,
            episode_id: None,
            progress: ProgressSnapshot::default(),
            error_text: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error_text: impl Into<String>) {
        self.error_text = Some(error_text.into());
        self.transition(JobStatus::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_pending_with_no_error() {
        let job = Job::new(
            "job-1".into(),
            "https://example.com/v".into(),
            EpisodeSeed::ByChannelAndTitle {
                channel_name: "Chan".into(),
                episode_title: "Ep".into(),
            },
            false,
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_text.is_none());
    }

    #[test]
    fn fail_transitions_to_error_and_records_text() {
        let mut job = Job::new(
            "job-2".into(),
            "https://example.com/v".into(),
            EpisodeSeed::ByEpisodeId(Uuid::nil()),
            false,
        );
        job.fail("download failed");
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_text.as_deref(), Some("download failed"));
    }
}
