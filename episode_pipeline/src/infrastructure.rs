// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Adapters implementing the domain's port traits against real external
//! systems (the downloader/transcoder binaries, Postgres, S3, SQS, an LLM
//! API), plus the Prometheus metrics sink. Holds the only code in the crate
//! that performs actual I/O against those systems; the application layer
//! calls through the trait objects this module constructs.

pub mod adapters;
pub mod http;
pub mod metrics;
