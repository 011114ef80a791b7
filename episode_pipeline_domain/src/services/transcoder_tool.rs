//! Port for adaptive-bitrate rendition production (§4.3).

use crate::error::WorkerResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One rung of the rendition ladder: a single fMP4 media file plus its own
/// byte-range-addressed media playlist.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub height: u32,
    pub width: u32,
    pub bitrate_kbps: u32,
    pub media_path: PathBuf,
    pub playlist_path: PathBuf,
}

/// The produced ladder plus the authored master manifest path.
#[derive(Debug, Clone)]
pub struct RenditionLadder {
    /// Descending by height.
    pub renditions: Vec<Rendition>,
    pub master_manifest_path: PathBuf,
    /// True when every rung failed and the adapter fell back to a
    /// single-variant manifest pointing at the merged source (§4.3, S6).
    pub non_adaptive_fallback: bool,
}

#[async_trait]
pub trait TranscoderTool: Send + Sync {
    /// Produces the fixed ladder below `top_edition` (§4.3), or falls back to
    /// a non-adaptive single-variant manifest on total failure.
    async fn build_rendition_ladder(&self, source_path: &Path, top_edition: u32, tmp_dir: &Path) -> WorkerResult<RenditionLadder>;
}
