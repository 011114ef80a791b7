//! Port for moving bytes between disk and the object store (§4.5).

use crate::error::WorkerResult;
use crate::value_objects::artifact_key::{ArtifactKey, ArtifactKind};
use async_trait::async_trait;
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Splits large files into `part_size`-byte parts, uploads concurrently,
    /// and completes the multipart upload.
    async fn put_object_multipart(&self, path: &Path, key: &str, part_size: u64) -> WorkerResult<()>;

    /// Concurrent ranged GET, used by the validator to sample-check uploads.
    async fn get_object_ranged(&self, key: &str, range: Range<u64>) -> WorkerResult<Vec<u8>>;

    /// Existence probe; a 404 is `Ok(None)`, not an error.
    async fn head_object(&self, key: &str) -> WorkerResult<Option<ObjectMeta>>;

    fn derive_key(&self, podcast_name: &str, episode_name: &str, kind: ArtifactKind, filename: &str) -> ArtifactKey {
        ArtifactKey::new(podcast_name, episode_name, kind, filename)
    }

    /// Synthesizes a stable public URL from the configured bucket/CDN base.
    fn public_url(&self, key: &str) -> String;
}
