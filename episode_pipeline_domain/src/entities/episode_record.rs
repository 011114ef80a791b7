//! The persistent catalog row (§3). Owned exclusively by the catalog; the
//! pipeline holds only a logical reference by `episode_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Canonical keys used within `EpisodeRecord::additional_data` (§3).
pub mod additional_data_keys {
    pub const VIDEO_LOCATION: &str = "videoLocation";
    pub const MASTER_M3U8: &str = "master_m3u8";
    pub const YOUTUBE_VIDEO_ID: &str = "youtubeVideoId";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const GUEST_ENRICHMENT: &str = "guestEnrichment";
    pub const TOPIC_ENRICHMENT: &str = "topicEnrichment";
    pub const VIDEO_DOWNLOAD_ERROR: &str = "videoDownloadError";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode_id: Uuid,
    pub episode_title: String,
    pub episode_description: String,
    pub channel_name: String,
    pub channel_id: String,
    pub host_name: Option<String>,
    pub host_description: Option<String>,
    pub original_uri: String,
    pub published_date: Option<DateTime<Utc>>,
    /// Always "Video" once merged (§3).
    pub content_type: String,
    pub duration_millis: i64,
    pub episode_images: Vec<String>,
    pub country: Option<String>,
    pub genre: Option<String>,
    pub guests: Vec<String>,
    pub guest_descriptions: Vec<String>,
    pub topics: Vec<String>,
    pub processing_done: bool,
    pub is_synced: bool,
    pub additional_data: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub episode_uri: Option<String>,
}

impl EpisodeRecord {
    pub fn new_pending(episode_id: Uuid, channel_name: String, episode_title: String, original_uri: String) -> Self {
        let now = Utc::now();
        Self {
            episode_id,
            episode_title,
            episode_description: String::new(),
            channel_name,
            channel_id: String::new(),
            host_name: None,
            host_description: None,
            original_uri,
            published_date: None,
            content_type: "Video".to_string(),
            duration_millis: 0,
            episode_images: Vec::new(),
            country: None,
            genre: None,
            guests: Vec::new(),
            guest_descriptions: Vec::new(),
            topics: Vec::new(),
            processing_done: false,
            is_synced: false,
            additional_data: HashMap::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            episode_uri: None,
        }
    }

    /// Whether the validator can consider this row complete (§4.8).
    pub fn passes_field_checks(&self) -> bool {
        !self.episode_title.is_empty()
            && !self.channel_name.is_empty()
            && self.duration_millis > 0
            && self.episode_uri.as_ref().is_some_and(|u| !u.is_empty())
            && self.processing_done
    }
}

/// A partial update applied at a pipeline checkpoint (§4.4 `update_stage`).
#[derive(Debug, Clone, Default)]
pub struct EpisodeRecordPatch {
    pub episode_title: Option<String>,
    pub episode_description: Option<String>,
    pub channel_id: Option<String>,
    pub duration_millis: Option<i64>,
    pub episode_uri: Option<String>,
    pub processing_done: Option<bool>,
    pub guests: Option<Vec<String>>,
    pub guest_descriptions: Option<Vec<String>>,
    pub topics: Option<Vec<String>>,
    pub additional_data: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_row_fails_field_checks_until_complete() {
        let record = EpisodeRecord::new_pending(Uuid::nil(), "Chan".into(), "Ep".into(), "https://x".into());
        assert!(!record.passes_field_checks());
    }

    #[test]
    fn complete_row_passes_field_checks() {
        let mut record = EpisodeRecord::new_pending(Uuid::nil(), "Chan".into(), "Ep".into(), "https://x".into());
        record.duration_millis = 60_000;
        record.episode_uri = Some("https://cdn/audio.m4a".into());
        record.processing_done = true;
        assert!(record.passes_field_checks());
    }
}
