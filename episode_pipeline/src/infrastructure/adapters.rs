// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Adapters Module
//!
//! Concrete implementations of the domain's port traits (§4.2-§4.6, §4.9):
//! `DownloaderTool`, `TranscoderTool`, `ObjectStore`, `Catalog`,
//! `MessageQueue`, and `Enricher`. The application layer depends only on the
//! traits; these adapters are wired in at the composition root.

pub mod catalog;
pub mod downloader;
pub mod enrichment;
pub mod message_queue;
pub mod object_store;
pub mod transcoder;

pub use catalog::PostgresCatalog;
pub use downloader::ProcessDownloaderTool;
pub use enrichment::LlmEnricher;
pub use message_queue::SqsMessageQueue;
pub use object_store::S3ObjectStore;
pub use transcoder::FfmpegTranscoderTool;
