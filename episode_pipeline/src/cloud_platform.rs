// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Binary-only `CapacityPlatform` wiring. Kept out of the library crate
//! because it is pure composition-root glue with no domain behavior of its
//! own to export or test in isolation.

use std::time::Duration;

use episode_pipeline::application::platform_protection::CapacityPlatform;
use tracing::debug;

/// Placeholder platform binding: logs protection changes and never reports
/// an interruption notice. Swapping in a real EC2/ASG client only requires
/// implementing `CapacityPlatform` against that SDK.
pub struct NoopCapacityPlatform;

#[async_trait::async_trait]
impl CapacityPlatform for NoopCapacityPlatform {
    async fn set_scale_in_protection(&self, enabled: bool) -> Result<(), String> {
        debug!(enabled, "scale-in protection request (no-op platform binding)");
        Ok(())
    }

    async fn poll_interruption_notice(&self) -> Option<Duration> {
        None
    }
}
