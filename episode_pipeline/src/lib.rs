// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Episode Ingestion Worker
//!
//! A queue-driven worker that turns a submitted video URL into a cataloged,
//! adaptive-bitrate-streamable episode: metadata fetch, parallel audio/video
//! download, mux, multi-rendition transcode, object-storage upload, catalog
//! upsert, and AI-derived guest/topic enrichment.
//!
//! ## Architecture Overview
//!
//! The worker follows Clean Architecture and Domain-Driven Design, split
//! across three crates plus this one:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             episode-pipeline-bootstrap                      │
//! │  (CLI, signals, layered config, shutdown coordination)      │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │            application (this crate)                         │
//! │  (orchestrator, poller, enrichment, validator, protection)   │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │            episode-pipeline-domain                          │
//! │  (entities, value objects, port traits — no I/O)             │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │         infrastructure (this crate)                          │
//! │  (yt-dlp/ffmpeg, Postgres, S3, SQS, LLM, Prometheus, axum)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Job
//! The in-process unit of work owned by the pipeline orchestrator: one
//! episode, tracked through `pending -> fetching-metadata ->
//! extracting-guests -> downloading -> merging -> uploading -> transcoding ->
//! completed`, with a side `error` state reachable from any stage.
//!
//! ### Concurrency kernel
//! Four named semaphores (`disk`, `io`, `http`, `db`) gate resource-bound work
//! independently, so a slow catalog write can never starve transcoding.
//!
//! ### Catalog
//! The persistent record of an episode (`EpisodeRecord`), updated at pipeline
//! checkpoints via a concurrency-safe idempotent upsert.
//!
//! ## Error Handling
//!
//! Every domain port returns `episode_pipeline_domain::error::WorkerError`, a
//! single enum whose variants carry their own retry/fatal/auth classification
//! so the concurrency kernel's retry wrapper and the poller's drain decision
//! dispatch on the type rather than on string matching.

pub mod application;
pub mod infrastructure;
pub mod runtime;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

pub use episode_pipeline_domain::entities::{EpisodeRecord, Job, JobStatus, ProgressSnapshot, VideoMetadata};
pub use episode_pipeline_domain::error::{WorkerError, WorkerResult};
pub use episode_pipeline_domain::value_objects::{ArtifactKey, ArtifactKind};
