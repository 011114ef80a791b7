//! Port for relational persistence of `EpisodeRecord` with concurrency-safe
//! idempotent upsert (§4.4).

use crate::entities::episode_record::EpisodeRecordPatch;
use crate::error::WorkerResult;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up an existing row by `(channel_name, episode_title)` first,
    /// then by `youtube_video_id` (when given) if no title/channel match
    /// exists, else inserts a new row — the idempotency precedence in §4.4.
    /// Row-lock contention maps to `WorkerError::CatalogBusy`, a retryable
    /// condition distinct from a genuine conflict.
    async fn find_or_create(&self, channel_name: &str, episode_title: &str, url: &str, youtube_video_id: Option<&str>) -> WorkerResult<(Uuid, bool)>;

    /// A partial update applied at a pipeline checkpoint. Every write is read
    /// back and compared field-by-field before commit; mismatch raises
    /// `WorkerError::CatalogVerificationFailed`.
    async fn update_stage(&self, episode_id: Uuid, patch: EpisodeRecordPatch) -> WorkerResult<()>;

    /// Sets `deleted_at`; does not physically delete the row.
    async fn mark_deleted(&self, episode_id: Uuid) -> WorkerResult<()>;

    /// Reopens a `processing_done=true` row for forced reprocessing (§4.4).
    async fn reopen_for_reprocess(&self, episode_id: Uuid) -> WorkerResult<()>;

    async fn find_by_episode_id(&self, episode_id: Uuid) -> WorkerResult<Option<crate::entities::EpisodeRecord>>;

    /// The primary idempotency lookup (§4.4, P1/P9): `SELECT` against
    /// `additionalData->>'youtubeVideoId'`.
    async fn find_by_youtube_video_id(&self, youtube_video_id: &str) -> WorkerResult<Option<crate::entities::EpisodeRecord>>;
}
