// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Process exit codes for the worker (§6):
//!
//! - **0**: normal shutdown (drained cleanly or one-shot work completed).
//! - **1**: a fatal downloader condition forced a drain.
//! - **2**: the standalone integrity scan (validator) found errors.
//! - **99**: the validator's self-check of its own invariants failed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal shutdown: drained cleanly, or one-shot work completed.
    #[default]
    Normal = 0,

    /// A fatal downloader condition (§4.2) forced a controlled drain (§4.10).
    FatalDownloaderDrain = 1,

    /// `validate` ran as a standalone audit and found integrity errors.
    IntegrityScanErrors = 2,

    /// The validator's self-check of its own invariants failed — a bug in
    /// the validator, not in the data it checked.
    ValidatorSelfCheckFailure = 99,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Normal => "normal shutdown",
            Self::FatalDownloaderDrain => "fatal downloader condition forced a drain",
            Self::IntegrityScanErrors => "integrity scan found errors",
            Self::ValidatorSelfCheckFailure => "validator self-check failed",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Normal)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_match_spec() {
        assert_eq!(ExitCode::Normal.as_i32(), 0);
        assert_eq!(ExitCode::FatalDownloaderDrain.as_i32(), 1);
        assert_eq!(ExitCode::IntegrityScanErrors.as_i32(), 2);
        assert_eq!(ExitCode::ValidatorSelfCheckFailure.as_i32(), 99);
    }

    #[test]
    fn default_is_normal() {
        assert_eq!(ExitCode::default(), ExitCode::Normal);
    }

    #[test]
    fn only_normal_is_success() {
        assert!(ExitCode::Normal.is_success());
        assert!(ExitCode::FatalDownloaderDrain.is_error());
        assert!(ExitCode::IntegrityScanErrors.is_error());
        assert!(ExitCode::ValidatorSelfCheckFailure.is_error());
    }

    #[test]
    fn display_includes_code_and_description() {
        let display = format!("{}", ExitCode::IntegrityScanErrors);
        assert!(display.contains("integrity scan"));
        assert!(display.contains('2'));
    }
}
