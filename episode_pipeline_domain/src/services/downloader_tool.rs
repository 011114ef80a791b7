//! Port for the external downloader binary (§4.2).

use crate::entities::VideoMetadata;
use crate::error::WorkerResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `on_progress(stage, percent, eta, speed, raw)`. Advisory only.
pub type DownloadProgressCallback = Arc<dyn Fn(&str, f32, Option<u64>, Option<String>, Option<String>) + Send + Sync>;

#[async_trait]
pub trait DownloaderTool: Send + Sync {
    async fn fetch_metadata(&self, url: &str) -> WorkerResult<VideoMetadata>;

    async fn download_audio(
        &self,
        url: &str,
        out_dir: &Path,
        metadata: Option<&VideoMetadata>,
        on_progress: Option<DownloadProgressCallback>,
    ) -> WorkerResult<PathBuf>;

    async fn download_video_no_audio(
        &self,
        url: &str,
        out_dir: &Path,
        max_height: u32,
        metadata: Option<&VideoMetadata>,
        on_progress: Option<DownloadProgressCallback>,
    ) -> WorkerResult<PathBuf>;

    async fn mux_audio_video(&self, video_path: &Path, audio_path: &Path, out_path: &Path) -> WorkerResult<PathBuf>;
}
