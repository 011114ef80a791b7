//! Advisory download/transcode progress (§3). Never mutates catalog state.

/// Progress for one leg (audio, video, or merged output).
#[derive(Debug, Clone, Default)]
pub struct LegProgress {
    pub percent: f32,
    pub eta_secs: Option<u64>,
    pub speed: Option<String>,
    pub raw_line: Option<String>,
}

/// Per-leg progress for the currently running job.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub audio: LegProgress,
    pub video: LegProgress,
    pub merged: LegProgress,
}

impl ProgressSnapshot {
    pub fn update_audio(&mut self, percent: f32, eta_secs: Option<u64>, speed: Option<String>, raw: Option<String>) {
        self.audio = LegProgress {
            percent,
            eta_secs,
            speed,
            raw_line: raw,
        };
    }

    pub fn update_video(&mut self, percent: f32, eta_secs: Option<u64>, speed: Option<String>, raw: Option<String>) {
        self.video = LegProgress {
            percent,
            eta_secs,
            speed,
            raw_line: raw,
        };
    }
}
