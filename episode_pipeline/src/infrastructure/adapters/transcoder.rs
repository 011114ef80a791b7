// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transcoder Adapter
//!
//! Produces an adaptive-bitrate rendition ladder and HLS master manifest from
//! a merged source file, by shelling out to an ffmpeg-shaped binary per rung
//! (§4.3). Each rung is a single fragmented-MP4 file addressed by byte range
//! (ffmpeg's `hls` muxer with `hls_segment_type fmp4` + `hls_flags
//! single_file`), not many small segment files. Falls back to a non-adaptive
//! single-variant manifest when every rung fails, rather than failing the job.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::{Rendition, RenditionLadder, TranscoderTool};
use tokio::process::Command;
use tracing::warn;

/// One rung of the fixed ladder (§4.3's literal table).
struct Rung {
    height: u32,
    width: u32,
    bitrate_kbps: u32,
}

const RUNG_1080P: Rung = Rung { height: 1080, width: 1920, bitrate_kbps: 2500 };
const RUNG_720P: Rung = Rung { height: 720, width: 1280, bitrate_kbps: 1200 };
const RUNG_480P: Rung = Rung { height: 480, width: 854, bitrate_kbps: 700 };
const RUNG_360P: Rung = Rung { height: 360, width: 640, bitrate_kbps: 400 };

/// §4.3's literal ladder table, keyed by `top_edition` (720 or 1080).
fn ladder_for(top_edition: u32) -> Vec<Rung> {
    if top_edition >= 1080 {
        vec![RUNG_1080P, RUNG_720P, RUNG_480P, RUNG_360P]
    } else {
        vec![RUNG_720P, RUNG_480P, RUNG_360P]
    }
}

pub struct FfmpegTranscoderTool {
    ffmpeg_binary: PathBuf,
}

impl FfmpegTranscoderTool {
    pub fn new(ffmpeg_binary: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_binary: ffmpeg_binary.into(),
        }
    }

    /// Runs ffmpeg's own `hls` muxer for one rung, producing a single fMP4
    /// media file and its byte-range-addressed playlist directly (no
    /// hand-authored segment math).
    async fn transcode_rung(&self, source_path: &Path, rung: &Rung, out_dir: &Path, audio_codec: &str) -> WorkerResult<Rendition> {
        let rendition_dir = out_dir.join(format!("{}p", rung.height));
        tokio::fs::create_dir_all(&rendition_dir)
            .await
            .map_err(|e| WorkerError::TranscodeError(format!("failed to create rendition dir: {e}")))?;

        let media_path = rendition_dir.join(format!("{}p.mp4", rung.height));
        let playlist_path = rendition_dir.join(format!("{}p.m3u8", rung.height));

        let output = Command::new(&self.ffmpeg_binary)
            .arg("-y")
            .arg("-i")
            .arg(source_path)
            .args(["-vf", &format!("scale={}:{}", rung.width, rung.height)])
            .args(["-c:v", "libx264"])
            .args(["-b:v", &format!("{}k", rung.bitrate_kbps)])
            .args(["-x264-params", "keyint=48:min-keyint=48:scenecut=0"])
            .args(["-c:a", audio_codec])
            .args(["-b:a", "96k", "-ar", "44100", "-ac", "2"])
            .args(["-f", "hls"])
            .args(["-hls_time", "6"])
            .args(["-hls_playlist_type", "vod"])
            .args(["-hls_segment_type", "fmp4"])
            .args(["-hls_flags", "single_file"])
            .arg(&playlist_path)
            .output()
            .await
            .map_err(|e| WorkerError::TranscodeError(format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::TranscodeError(format!(
                "ffmpeg failed for {}p rung: {stderr}",
                rung.height
            )));
        }

        Ok(Rendition {
            height: rung.height,
            width: rung.width,
            bitrate_kbps: rung.bitrate_kbps,
            media_path,
            playlist_path,
        })
    }

    /// Runs one rung, retrying once with `-c:a copy` if the initial attempt's
    /// stderr shows the audio-encoder assertion (§4.3's documented fallback).
    async fn transcode_rung_with_fallback(&self, source_path: &Path, rung: &Rung, out_dir: &Path) -> WorkerResult<Rendition> {
        match self.transcode_rung(source_path, rung, out_dir, "aac").await {
            Ok(rendition) => Ok(rendition),
            Err(WorkerError::TranscodeError(msg)) if msg.to_lowercase().contains("assert") => {
                warn!(height = rung.height, "audio-encoder assertion detected, retrying with -c:a copy");
                self.transcode_rung(source_path, rung, out_dir, "copy").await
            }
            Err(err) => Err(err),
        }
    }

    fn write_master_manifest(&self, renditions: &[Rendition], manifest_path: &Path) -> WorkerResult<()> {
        let mut sorted: Vec<&Rendition> = renditions.iter().collect();
        sorted.sort_by(|a, b| b.height.cmp(&a.height));

        let mut manifest = String::from("#EXTM3U\n#EXT-X-VERSION:7\n");
        for rendition in sorted {
            let bandwidth = rendition.bitrate_kbps * 1000;
            let filename = rendition.playlist_path.file_name().and_then(|n| n.to_str()).unwrap_or("rendition.m3u8");
            manifest.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={}x{},CODECS=\"avc1.4d401f,mp4a.40.2\"\n{}p/{filename}\n",
                rendition.width, rendition.height, rendition.height
            ));
        }

        std::fs::write(manifest_path, manifest)
            .map_err(|e| WorkerError::TranscodeError(format!("failed to write master manifest: {e}")))
    }

    fn write_non_adaptive_manifest(&self, source_path: &Path, manifest_path: &Path) -> WorkerResult<()> {
        let filename = source_path.file_name().and_then(|n| n.to_str()).unwrap_or("source.mp4");
        let manifest = format!(
            "#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1920x1080,CODECS=\"avc1.4d401f,mp4a.40.2\"\n{filename}\n"
        );
        std::fs::write(manifest_path, manifest)
            .map_err(|e| WorkerError::TranscodeError(format!("failed to write fallback manifest: {e}")))
    }
}

#[async_trait]
impl TranscoderTool for FfmpegTranscoderTool {
    async fn build_rendition_ladder(&self, source_path: &Path, top_edition: u32, tmp_dir: &Path) -> WorkerResult<RenditionLadder> {
        let hls_dir = tmp_dir.join("hls_output");
        tokio::fs::create_dir_all(&hls_dir)
            .await
            .map_err(|e| WorkerError::TranscodeError(format!("failed to create hls dir: {e}")))?;

        let rungs = ladder_for(top_edition);
        let mut renditions = Vec::new();

        for rung in &rungs {
            match self.transcode_rung_with_fallback(source_path, rung, &hls_dir).await {
                Ok(rendition) => renditions.push(rendition),
                Err(err) => warn!(height = rung.height, error = %err, "rung transcode failed, continuing ladder"),
            }
        }

        let master_manifest_path = hls_dir.join("master.m3u8");

        if renditions.is_empty() {
            warn!("every rendition rung failed; falling back to non-adaptive master manifest");
            self.write_non_adaptive_manifest(source_path, &master_manifest_path)?;
            return Ok(RenditionLadder {
                renditions: Vec::new(),
                master_manifest_path,
                non_adaptive_fallback: true,
            });
        }

        self.write_master_manifest(&renditions, &master_manifest_path)?;

        Ok(RenditionLadder {
            renditions,
            master_manifest_path,
            non_adaptive_fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_for_1080_is_the_full_four_rung_table() {
        let rungs = ladder_for(1080);
        let heights: Vec<u32> = rungs.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![1080, 720, 480, 360]);
        let bitrates: Vec<u32> = rungs.iter().map(|r| r.bitrate_kbps).collect();
        assert_eq!(bitrates, vec![2500, 1200, 700, 400]);
    }

    #[test]
    fn ladder_for_720_drops_the_top_rung() {
        let rungs = ladder_for(720);
        let heights: Vec<u32> = rungs.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![720, 480, 360]);
    }

    #[test]
    fn widths_match_the_standard_16_9_pairing() {
        let rungs = ladder_for(1080);
        let pairs: Vec<(u32, u32)> = rungs.iter().map(|r| (r.width, r.height)).collect();
        assert_eq!(pairs, vec![(1920, 1080), (1280, 720), (854, 480), (640, 360)]);
    }
}
