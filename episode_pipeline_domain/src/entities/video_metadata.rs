//! Normalized descriptor of the remote item, produced by the downloader-tool
//! adapter's metadata probe (§3, §4.2). Immutable once fetched.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub identifier: String,
    pub title: String,
    pub uploader: String,
    pub description: String,
    pub duration_secs: u64,
    pub publication_date: Option<String>,
    pub thumbnail_url: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub upload_date: Option<String>,
    pub original_url: String,
}
