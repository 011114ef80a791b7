// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Enrichment Orchestrator
//!
//! Drives the `Enricher` port (§4.9): guest extraction, per-guest bio
//! enrichment, and topic generation, each recording provenance rather than
//! silently dropping failures. Runs concurrently with the download legs in
//! the pipeline orchestrator; never itself fails the job.

use std::sync::Arc;

use chrono::Utc;
use episode_pipeline_domain::error::WorkerResult;
use episode_pipeline_domain::services::{Enricher, EnrichmentRecord};
use serde_json::Value;

use crate::runtime::concurrency_kernel::{concurrency_kernel, ResourceLabel};

/// Every enriched field plus its provenance trail, ready to fold into an
/// `EpisodeRecordPatch`.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub guests: Vec<String>,
    pub guest_descriptions: Vec<String>,
    pub topics: Vec<String>,
    pub guest_provenance: Vec<Value>,
    pub topic_provenance: Value,
}

#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    enricher: Arc<dyn Enricher>,
    model_label: String,
}

impl EnrichmentOrchestrator {
    pub fn new(enricher: Arc<dyn Enricher>) -> Self {
        Self {
            enricher,
            model_label: "configured-llm".to_string(),
        }
    }

    pub async fn enrich(&self, title: &str, description: &str) -> WorkerResult<EnrichmentOutcome> {
        let kernel = concurrency_kernel();

        let (guests_result, topics_result) = tokio::join!(
            kernel.with_semaphore(ResourceLabel::Http, || self.enricher.extract_guests(title, description)),
            kernel.with_semaphore(ResourceLabel::Http, || self.enricher.generate_topics(title, description)),
        );

        let topic_provenance = self.record(topics_result.is_ok());
        let topics = topics_result.unwrap_or_default();

        let guests = guests_result.unwrap_or_default();
        let bio_results = futures::future::join_all(
            guests
                .iter()
                .map(|guest| kernel.with_semaphore(ResourceLabel::Http, || self.enricher.enrich_guest_bio(guest, description))),
        )
        .await;

        let mut guest_descriptions = Vec::with_capacity(guests.len());
        let mut guest_provenance = Vec::with_capacity(guests.len());
        for bio_result in bio_results {
            guest_provenance.push(self.record(bio_result.is_ok()));
            guest_descriptions.push(bio_result.ok().flatten().unwrap_or_default());
        }

        Ok(EnrichmentOutcome {
            guests,
            guest_descriptions,
            topics,
            guest_provenance,
            topic_provenance,
        })
    }

    fn record(&self, succeeded: bool) -> Value {
        let record = EnrichmentRecord {
            model: self.model_label.clone(),
            attempted_at: Utc::now(),
            succeeded,
            error: None,
        };
        serde_json::to_value(record).unwrap_or(Value::Null)
    }
}
