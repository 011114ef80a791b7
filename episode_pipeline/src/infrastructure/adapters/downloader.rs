// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Downloader-Tool Adapter
//!
//! Invokes an external yt-dlp-shaped binary for metadata probing and
//! audio/video download legs, and an ffmpeg-shaped binary to mux the two legs
//! into one file (§4.2).
//!
//! Progress is parsed from the binary's `--newline` progress lines and handed
//! to the caller's callback; it never touches catalog state.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use episode_pipeline_domain::entities::VideoMetadata;
use episode_pipeline_domain::error::{WorkerError, WorkerResult};
use episode_pipeline_domain::services::{DownloadProgressCallback, DownloaderTool};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Stderr substrings that signal a fatal, non-retryable yt-dlp condition
/// (extractor breakage, a 403 that survives cookie refresh) rather than a
/// transient network error (§4.2).
const FATAL_STDERR_SIGNATURES: &[&str] = &[
    "Unsupported URL",
    "This video is unavailable",
    "HTTP Error 403: Forbidden",
    "Unable to extract",
];

#[derive(Debug, Deserialize)]
struct YtDlpJson {
    id: String,
    title: String,
    uploader: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    view_count: Option<u64>,
    like_count: Option<u64>,
    webpage_url: Option<String>,
}

/// Concrete `DownloaderTool` built on invoking `yt_dlp_binary` / `ffmpeg_binary`
/// as child processes.
pub struct ProcessDownloaderTool {
    yt_dlp_binary: PathBuf,
    ffmpeg_binary: PathBuf,
    preferred_audio_format: String,
    connections: u32,
    cookies_file: Option<PathBuf>,
}

impl ProcessDownloaderTool {
    pub fn new(
        yt_dlp_binary: impl Into<PathBuf>,
        ffmpeg_binary: impl Into<PathBuf>,
        preferred_audio_format: impl Into<String>,
        connections: u32,
        cookies_file: Option<PathBuf>,
    ) -> Self {
        Self {
            yt_dlp_binary: yt_dlp_binary.into(),
            ffmpeg_binary: ffmpeg_binary.into(),
            preferred_audio_format: preferred_audio_format.into(),
            connections,
            cookies_file,
        }
    }

    fn audio_format_selector(&self) -> String {
        let fallback_chain = ["mp3", "m4a", "aac", "opus"];
        let preferred = self.preferred_audio_format.as_str();
        let mut formats: Vec<&str> = std::iter::once(preferred)
            .chain(fallback_chain.iter().copied().filter(|f| *f != preferred))
            .collect();
        formats.push("m4a");
        formats.dedup();
        format!("bestaudio[ext={}]/bestaudio", formats.join("]/bestaudio[ext="))
    }

    fn classify_stderr(stderr: &str) -> Option<WorkerError> {
        FATAL_STDERR_SIGNATURES
            .iter()
            .find(|sig| stderr.contains(**sig))
            .map(|sig| WorkerError::FatalDownloaderError(format!("yt-dlp fatal signature: {sig}")))
    }

    async fn run_and_stream_progress(
        &self,
        args: &[String],
        stage: &str,
        on_progress: Option<DownloadProgressCallback>,
    ) -> WorkerResult<(bool, String)> {
        let mut child = Command::new(&self.yt_dlp_binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::download_error(format!("failed to spawn yt-dlp: {e}")))?;

        let stdout = child.stdout.take().expect("stdout piped");
        let mut lines = BufReader::new(stdout).lines();
        let stage_owned = stage.to_string();

        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(cb) = &on_progress {
                if let Some(percent) = parse_progress_percent(&line) {
                    cb(&stage_owned, percent, None, None, Some(line.clone()));
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| WorkerError::download_error(format!("yt-dlp process error: {e}")))?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok((output.status.success(), stderr))
    }
}

fn parse_progress_percent(line: &str) -> Option<f32> {
    let idx = line.find('%')?;
    let start = line[..idx].rfind(' ').map(|i| i + 1).unwrap_or(0);
    line[start..idx].trim().parse::<f32>().ok()
}

#[async_trait]
impl DownloaderTool for ProcessDownloaderTool {
    async fn fetch_metadata(&self, url: &str) -> WorkerResult<VideoMetadata> {
        let mut args = vec!["--dump-json".to_string(), "--no-playlist".to_string()];
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args.push(url.to_string());

        let output = Command::new(&self.yt_dlp_binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| WorkerError::metadata_error(format!("failed to spawn yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if let Some(fatal) = Self::classify_stderr(&stderr) {
                return Err(fatal);
            }
            return Err(WorkerError::metadata_error(format!("yt-dlp exited non-zero: {stderr}")));
        }

        let parsed: YtDlpJson = serde_json::from_slice(&output.stdout)
            .map_err(|e| WorkerError::metadata_error(format!("failed to parse yt-dlp json: {e}")))?;

        debug!(video_id = %parsed.id, "fetched video metadata");

        Ok(VideoMetadata {
            identifier: parsed.id,
            title: parsed.title,
            uploader: parsed.uploader.unwrap_or_default(),
            description: parsed.description.unwrap_or_default(),
            duration_secs: parsed.duration.unwrap_or(0.0) as u64,
            publication_date: parsed.upload_date.clone(),
            thumbnail_url: parsed.thumbnail,
            view_count: parsed.view_count,
            like_count: parsed.like_count,
            upload_date: parsed.upload_date,
            original_url: parsed.webpage_url.unwrap_or_else(|| url.to_string()),
        })
    }

    async fn download_audio(
        &self,
        url: &str,
        out_dir: &Path,
        _metadata: Option<&VideoMetadata>,
        on_progress: Option<DownloadProgressCallback>,
    ) -> WorkerResult<PathBuf> {
        let out_template = out_dir.join("audio.%(ext)s");
        let args = vec![
            "-f".to_string(),
            self.audio_format_selector(),
            "-N".to_string(),
            self.connections.to_string(),
            "--newline".to_string(),
            "-o".to_string(),
            out_template.to_string_lossy().into_owned(),
            url.to_string(),
        ];

        let (success, stderr) = self.run_and_stream_progress(&args, "audio_download", on_progress).await?;
        if !success {
            if let Some(fatal) = Self::classify_stderr(&stderr) {
                return Err(fatal);
            }
            return Err(WorkerError::download_error(format!("audio download failed: {stderr}")));
        }

        find_single_output(out_dir, "audio")
    }

    async fn download_video_no_audio(
        &self,
        url: &str,
        out_dir: &Path,
        max_height: u32,
        _metadata: Option<&VideoMetadata>,
        on_progress: Option<DownloadProgressCallback>,
    ) -> WorkerResult<PathBuf> {
        let out_template = out_dir.join("video.%(ext)s");
        let format_selector = format!("bestvideo[height<={max_height}]/bestvideo");
        let args = vec![
            "-f".to_string(),
            format_selector,
            "-N".to_string(),
            self.connections.to_string(),
            "--newline".to_string(),
            "-o".to_string(),
            out_template.to_string_lossy().into_owned(),
            url.to_string(),
        ];

        let (success, stderr) = self.run_and_stream_progress(&args, "video_download", on_progress).await?;
        if !success {
            if let Some(fatal) = Self::classify_stderr(&stderr) {
                return Err(fatal);
            }
            return Err(WorkerError::download_error(format!("video download failed: {stderr}")));
        }

        find_single_output(out_dir, "video")
    }

    async fn mux_audio_video(&self, video_path: &Path, audio_path: &Path, out_path: &Path) -> WorkerResult<PathBuf> {
        let output = Command::new(&self.ffmpeg_binary)
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .arg("-i")
            .arg(audio_path)
            .args(["-c", "copy", "-fflags", "+genpts", "-avoid_negative_ts", "make_zero"])
            .arg(out_path)
            .output()
            .await
            .map_err(|e| WorkerError::MuxError(format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::MuxError(format!("ffmpeg mux failed: {stderr}")));
        }

        let metadata = tokio::fs::metadata(out_path)
            .await
            .map_err(|e| WorkerError::MuxError(format!("muxed output missing: {e}")))?;
        if metadata.len() == 0 {
            return Err(WorkerError::MuxError("muxed output is empty".to_string()));
        }

        Ok(out_path.to_path_buf())
    }
}

fn find_single_output(dir: &Path, stem: &str) -> WorkerResult<PathBuf> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| WorkerError::download_error(format!("failed to scan output dir: {e}")))?;

    entries
        .find_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let matches = path.file_stem().and_then(|s| s.to_str()).map(|s| s == stem).unwrap_or(false);
            matches.then_some(path)
        })
        .ok_or_else(|| {
            warn!(stem, "no downloaded file found matching stem");
            WorkerError::download_error(format!("no output file found for stem '{stem}'"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_format_selector_prefers_configured_format_first() {
        let tool = ProcessDownloaderTool::new("yt-dlp", "ffmpeg", "opus", 4, None);
        let selector = tool.audio_format_selector();
        assert!(selector.starts_with("bestaudio[ext=opus]"));
    }

    #[test]
    fn classifies_known_fatal_signatures() {
        let err = ProcessDownloaderTool::classify_stderr("ERROR: Unsupported URL: foo");
        assert!(matches!(err, Some(WorkerError::FatalDownloaderError(_))));
    }

    #[test]
    fn non_fatal_stderr_is_not_classified_as_fatal() {
        let err = ProcessDownloaderTool::classify_stderr("WARNING: retrying connection");
        assert!(err.is_none());
    }

    #[test]
    fn parses_percent_from_progress_line() {
        let percent = parse_progress_percent("[download]  42.5% of 10.00MiB at 1.00MiB/s ETA 00:05");
        assert_eq!(percent, Some(42.5));
    }
}
