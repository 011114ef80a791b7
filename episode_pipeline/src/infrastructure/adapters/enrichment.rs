// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Enrichment Adapter
//!
//! AI-derived guest/topic metadata via an HTTP chat-completion-shaped API
//! (§4.9). Tolerant of partial failure — a failing guest bio never drops the
//! other guests, and a failing call returns an empty result rather than
//! propagating to the pipeline.

use async_trait::async_trait;
use episode_pipeline_domain::error::WorkerResult;
use episode_pipeline_domain::services::Enricher;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct LlmEnricher {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmEnricher {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn complete(&self, system_prompt: &str, user_prompt: String) -> Result<String, String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("llm request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("llm returned status {}", response.status()));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| format!("failed to parse llm response: {e}"))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "llm returned no choices".to_string())
    }
}

#[async_trait]
impl Enricher for LlmEnricher {
    async fn extract_guests(&self, title: &str, description: &str) -> WorkerResult<Vec<String>> {
        let prompt = format!("Title: {title}\nDescription: {description}\n\nList guest names, one per line. If none, reply NONE.");
        match self.complete("You extract guest names from podcast episode metadata.", prompt).await {
            Ok(text) => Ok(text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("none"))
                .map(str::to_string)
                .collect()),
            Err(err) => {
                warn!(error = %err, "guest extraction failed, continuing without guests");
                Ok(Vec::new())
            }
        }
    }

    async fn enrich_guest_bio(&self, name: &str, context: &str) -> WorkerResult<Option<String>> {
        let prompt = format!("Guest name: {name}\nEpisode context: {context}\n\nWrite a two-sentence bio.");
        match self.complete("You write short factual guest bios from podcast context.", prompt).await {
            Ok(text) => Ok(Some(text.trim().to_string())),
            Err(err) => {
                warn!(guest = name, error = %err, "guest bio enrichment failed, skipping this guest");
                Ok(None)
            }
        }
    }

    async fn generate_topics(&self, title: &str, description: &str) -> WorkerResult<Vec<String>> {
        let prompt = format!("Title: {title}\nDescription: {description}\n\nList discussion topics, one per line.");
        match self.complete("You extract discussion topics from podcast episode metadata.", prompt).await {
            Ok(text) => Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()),
            Err(err) => {
                warn!(error = %err, "topic generation failed, continuing without topics");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enricher_constructs_with_trimmed_base_url_handling() {
        let enricher = LlmEnricher::new(Client::new(), "https://api.example.com/v1", "key", "gpt");
        assert_eq!(enricher.base_url, "https://api.example.com/v1");
    }
}
