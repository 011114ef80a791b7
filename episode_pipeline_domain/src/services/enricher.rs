//! Port for AI-derived guest/topic metadata, tolerant of partial failure
//! (§4.9).

use crate::error::WorkerResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance recorded under `additionalData.guestEnrichment` /
/// `additionalData.topicEnrichment` for every attempted call (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub model: String,
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Empty result on failure or no guests detected; never blocks the
    /// pipeline.
    async fn extract_guests(&self, title: &str, description: &str) -> WorkerResult<Vec<String>>;

    /// Per-guest failures are independent; one failing guest doesn't drop the
    /// others.
    async fn enrich_guest_bio(&self, name: &str, context: &str) -> WorkerResult<Option<String>>;

    async fn generate_topics(&self, title: &str, description: &str) -> WorkerResult<Vec<String>>;
}
