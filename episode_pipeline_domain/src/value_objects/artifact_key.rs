//! Structured object-storage keys (§3).

use super::slug::slugify;
use std::fmt;

/// The artifact category segment of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Videos,
    VideoStream,
    Image,
}

impl ArtifactKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Videos => "videos",
            Self::VideoStream => "video_stream",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{podcastSlug}/{episodeSlug}/original/{kind}/{filename}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    podcast_slug: String,
    episode_slug: String,
    kind: ArtifactKind,
    filename: String,
}

impl ArtifactKey {
    pub fn new(
        podcast_name: &str,
        episode_name: &str,
        kind: ArtifactKind,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            podcast_slug: slugify(podcast_name),
            episode_slug: slugify(episode_name),
            kind,
            filename: filename.into(),
        }
    }

    pub fn podcast_slug(&self) -> &str {
        &self.podcast_slug
    }

    pub fn episode_slug(&self) -> &str {
        &self.episode_slug
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The full object-store key string.
    pub fn as_key(&self) -> String {
        format!(
            "{}/{}/original/{}/{}",
            self.podcast_slug, self.episode_slug, self.kind, self.filename
        )
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_the_expected_path_shape() {
        let key = ArtifactKey::new("The Joe Show", "Episode 42", ArtifactKind::Audio, "audio.m4a");
        assert_eq!(key.as_key(), "the-joe-show/episode-42/original/audio/audio.m4a");
    }

    #[test]
    fn distinct_kinds_produce_distinct_segments() {
        let base = |kind| ArtifactKey::new("p", "e", kind, "f").as_key();
        assert_ne!(base(ArtifactKind::Audio), base(ArtifactKind::Videos));
        assert_ne!(base(ArtifactKind::VideoStream), base(ArtifactKind::Image));
    }
}
