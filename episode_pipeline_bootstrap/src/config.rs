// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Configuration
//!
//! Layered configuration for the episode ingestion worker (§6).
//!
//! ## Layering
//!
//! Defaults, then an optional TOML file, then environment variables, each
//! layer overriding the last. Built on the `config` crate the way the
//! teacher layers `AppConfig`, generalized from a handful of bootstrap flags
//! to the worker's full environment surface.
//!
//! ## Immutability
//!
//! `WorkerConfig` is validated and immutable once constructed: thread-safe to
//! share across every task in the poller/orchestrator without synchronization.
//!
//! ## Usage
//!
//! ```rust
//! use episode_pipeline_bootstrap::config::WorkerConfig;
//!
//! // WorkerConfig::load() reads defaults, an optional TOML file, then env vars.
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Top-of-ladder rendition (§4.3): 720p or 1080p.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopEdition {
    P720,
    P1080,
}

impl Default for TopEdition {
    fn default() -> Self {
        TopEdition::P1080
    }
}

impl std::str::FromStr for TopEdition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "720" => Ok(TopEdition::P720),
            "1080" => Ok(TopEdition::P1080),
            other => Err(ConfigError::InvalidValue {
                field: "TOP_EDITION".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("missing required configuration: {0}")]
    Missing(String),
}

/// Raw shape deserialized from the layered `config` sources before
/// validation, mirroring the environment variables named in §6 one-to-one.
#[derive(Debug, Deserialize)]
struct RawWorkerConfig {
    poll_wait_secs: Option<u64>,
    poll_batch_size: Option<u32>,
    max_concurrent_jobs: Option<usize>,
    worker_cpu_override: Option<usize>,
    disk_concurrency: Option<usize>,
    io_concurrency: Option<usize>,
    http_concurrency: Option<usize>,
    db_concurrency: Option<usize>,
    preferred_audio_format: Option<String>,
    ytdlp_connections: Option<u32>,
    protection_poll_secs: Option<u64>,
    shutdown_grace_ms: Option<u64>,
    top_edition: Option<String>,
    metrics_enabled: Option<bool>,
    database_url: Option<String>,
    object_store_bucket: Option<String>,
    object_store_region: Option<String>,
    object_store_access_key: Option<String>,
    object_store_secret_key: Option<String>,
    object_store_endpoint: Option<String>,
    llm_api_base_url: Option<String>,
    llm_api_key: Option<String>,
    bind_addr: Option<String>,
    sqs_queue_url: Option<String>,
}

/// Immutable worker configuration, fields named one-to-one with §6's
/// environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_wait: std::time::Duration,
    pub poll_batch_size: u32,
    pub max_concurrent_jobs: usize,
    pub worker_cpu_override: Option<usize>,
    pub disk_concurrency: usize,
    pub io_concurrency: usize,
    pub http_concurrency: usize,
    pub db_concurrency: usize,
    pub preferred_audio_format: String,
    pub ytdlp_connections: u32,
    pub protection_poll: std::time::Duration,
    pub shutdown_grace: std::time::Duration,
    pub top_edition: TopEdition,
    pub metrics_enabled: bool,
    pub database_url: String,
    pub object_store_bucket: String,
    pub object_store_region: String,
    pub object_store_access_key: Option<String>,
    pub object_store_secret_key: Option<String>,
    pub object_store_endpoint: Option<String>,
    pub llm_api_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub bind_addr: String,
    pub sqs_queue_url: String,
}

impl WorkerConfig {
    /// Load configuration layered defaults -> optional TOML file -> env vars.
    ///
    /// Env vars are read with no prefix, upper-snake-case matching the field
    /// names above (e.g. `DATABASE_URL`, `TOP_EDITION`).
    pub fn load(config_file: Option<&PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("poll_wait_secs", 5i64)?
            .set_default("poll_batch_size", 5i64)?
            .set_default("max_concurrent_jobs", 4i64)?
            .set_default("disk_concurrency", 4i64)?
            .set_default("io_concurrency", 8i64)?
            .set_default("http_concurrency", 16i64)?
            .set_default("db_concurrency", 8i64)?
            .set_default("preferred_audio_format", "m4a")?
            .set_default("ytdlp_connections", 4i64)?
            .set_default("protection_poll_secs", 30i64)?
            .set_default("shutdown_grace_ms", 30_000i64)?
            .set_default("top_edition", "1080")?
            .set_default("metrics_enabled", true)?
            .set_default("bind_addr", "0.0.0.0:8080")?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(config::Environment::default().try_parsing(true));

        let raw: RawWorkerConfig = builder.build()?.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawWorkerConfig) -> Result<Self, ConfigError> {
        let top_edition = match raw.top_edition.as_deref() {
            Some(value) => value.parse()?,
            None => TopEdition::default(),
        };

        Ok(Self {
            poll_wait: std::time::Duration::from_secs(raw.poll_wait_secs.unwrap_or(5)),
            poll_batch_size: raw.poll_batch_size.unwrap_or(5),
            max_concurrent_jobs: raw.max_concurrent_jobs.unwrap_or(4),
            worker_cpu_override: raw.worker_cpu_override,
            disk_concurrency: raw.disk_concurrency.unwrap_or(4),
            io_concurrency: raw.io_concurrency.unwrap_or(8),
            http_concurrency: raw.http_concurrency.unwrap_or(16),
            db_concurrency: raw.db_concurrency.unwrap_or(8),
            preferred_audio_format: raw.preferred_audio_format.unwrap_or_else(|| "m4a".to_string()),
            ytdlp_connections: raw.ytdlp_connections.unwrap_or(4),
            protection_poll: std::time::Duration::from_secs(raw.protection_poll_secs.unwrap_or(30)),
            shutdown_grace: std::time::Duration::from_millis(raw.shutdown_grace_ms.unwrap_or(30_000)),
            top_edition,
            metrics_enabled: raw.metrics_enabled.unwrap_or(true),
            database_url: raw
                .database_url
                .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))?,
            object_store_bucket: raw
                .object_store_bucket
                .ok_or_else(|| ConfigError::Missing("OBJECT_STORE_BUCKET".to_string()))?,
            object_store_region: raw.object_store_region.unwrap_or_else(|| "us-east-1".to_string()),
            object_store_access_key: raw.object_store_access_key,
            object_store_secret_key: raw.object_store_secret_key,
            object_store_endpoint: raw.object_store_endpoint,
            llm_api_base_url: raw.llm_api_base_url,
            llm_api_key: raw.llm_api_key,
            bind_addr: raw.bind_addr.unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            sqs_queue_url: raw
                .sqs_queue_url
                .ok_or_else(|| ConfigError::Missing("SQS_QUEUE_URL".to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawWorkerConfig {
        RawWorkerConfig {
            poll_wait_secs: None,
            poll_batch_size: None,
            max_concurrent_jobs: None,
            worker_cpu_override: None,
            disk_concurrency: None,
            io_concurrency: None,
            http_concurrency: None,
            db_concurrency: None,
            preferred_audio_format: None,
            ytdlp_connections: None,
            protection_poll_secs: None,
            shutdown_grace_ms: None,
            top_edition: None,
            metrics_enabled: None,
            database_url: Some("postgres://localhost/episodes".to_string()),
            object_store_bucket: Some("episodes-bucket".to_string()),
            object_store_region: None,
            object_store_access_key: None,
            object_store_secret_key: None,
            object_store_endpoint: None,
            llm_api_base_url: None,
            llm_api_key: None,
            bind_addr: None,
            sqs_queue_url: Some("https://sqs.us-east-1.amazonaws.com/000000000000/episodes".to_string()),
        }
    }

    #[test]
    fn defaults_fill_in_when_missing() {
        let config = WorkerConfig::from_raw(minimal_raw()).unwrap();
        assert_eq!(config.poll_wait, std::time::Duration::from_secs(5));
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.top_edition, TopEdition::P1080);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn missing_database_url_fails() {
        let mut raw = minimal_raw();
        raw.database_url = None;
        let result = WorkerConfig::from_raw(raw);
        assert!(result.is_err());
    }

    #[test]
    fn missing_sqs_queue_url_fails() {
        let mut raw = minimal_raw();
        raw.sqs_queue_url = None;
        let result = WorkerConfig::from_raw(raw);
        assert!(result.is_err());
    }

    #[test]
    fn top_edition_parses_720_and_1080() {
        assert_eq!("720".parse::<TopEdition>().unwrap(), TopEdition::P720);
        assert_eq!("1080".parse::<TopEdition>().unwrap(), TopEdition::P1080);
        assert!("480".parse::<TopEdition>().is_err());
    }

    #[test]
    fn explicit_top_edition_overrides_default() {
        let mut raw = minimal_raw();
        raw.top_edition = Some("720".to_string());
        let config = WorkerConfig::from_raw(raw).unwrap();
        assert_eq!(config.top_edition, TopEdition::P720);
    }
}
