// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime Module
//!
//! Process-wide concurrency primitives: the four named semaphores, the
//! retry/step wrappers, and container-quota-aware CPU detection (§4.1, §5).

pub mod concurrency_kernel;

pub use concurrency_kernel::{
    concurrency_kernel, detect_effective_cores, init_concurrency_kernel, with_retry, ConcurrencyKernel,
    DisplacedLimits, KernelConfig, ResourceLabel,
};
