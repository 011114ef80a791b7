// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure Command-Line Argument Parsing
//!
//! The worker's CLI surface is narrow (a submit URL, optional identifiers, a
//! config file path) compared to the file-processing pipeline this was
//! adapted from, so validation here is limited to what that surface actually
//! needs: length limits, shell-metacharacter rejection, and config-path
//! existence. There are no bulk file-path arguments to defend with system
//! directory denylists.
//!
//! ## Dangerous Patterns Detected
//!
//! - Backticks, `;` `&` `|` `>` `<` - shell metacharacters
//! - Null bytes, newlines, carriage returns

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum single argument length
const MAX_ARG_LENGTH: usize = 2048;

/// Dangerous patterns that indicate potential shell injection
const DANGEROUS_PATTERNS: &[&str] = &["`", ";", "&", "|", ">", "<", "\n", "\r", "\0"];

/// Secure argument parsing errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// Argument exceeds maximum length
    #[error("argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    /// Dangerous pattern detected
    #[error("dangerous pattern detected in argument: {pattern} in {arg}")]
    DangerousPattern { pattern: String, arg: String },

    /// Path does not exist
    #[error("path does not exist: {0}")]
    PathNotFound(String),

    /// Invalid argument value
    #[error("invalid argument value for {arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
}

/// Secure argument parser
pub struct SecureArgParser;

impl SecureArgParser {
    /// Validate a single argument for security issues
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LENGTH {
            return Err(ParseError::ArgumentTooLong(
                arg.chars().take(50).collect::<String>() + "...",
            ));
        }

        for pattern in DANGEROUS_PATTERNS {
            if arg.contains(pattern) {
                return Err(ParseError::DangerousPattern {
                    pattern: pattern.to_string(),
                    arg: arg.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validate a config file path: must pass the basic argument checks and
    /// exist on disk.
    pub fn validate_config_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path)?;

        let path_obj = Path::new(path);
        if !path_obj.exists() {
            return Err(ParseError::PathNotFound(path.to_string()));
        }

        Ok(path_obj.to_path_buf())
    }

    /// Validate a source URL: scheme must be http(s), no dangerous
    /// characters.
    pub fn validate_url(url: &str) -> Result<(), ParseError> {
        Self::validate_argument(url)?;

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ParseError::InvalidValue {
                arg: "url".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod argument_validation {
        use super::*;

        #[test]
        fn accepts_safe_arguments() {
            assert!(SecureArgParser::validate_argument("safe-arg").is_ok());
            assert!(SecureArgParser::validate_argument("https://example.com/watch?v=abc").is_ok());
        }

        #[test]
        fn rejects_too_long_arguments() {
            let long_arg = "a".repeat(MAX_ARG_LENGTH + 1);
            assert!(matches!(
                SecureArgParser::validate_argument(&long_arg),
                Err(ParseError::ArgumentTooLong(_))
            ));
        }

        #[test]
        fn detects_dangerous_patterns() {
            let dangerous = vec!["`ls`", "file;rm -rf /", "file&background", "file|pipe", "file>output", "file<input"];

            for arg in dangerous {
                assert!(
                    matches!(SecureArgParser::validate_argument(arg), Err(ParseError::DangerousPattern { .. })),
                    "failed to detect dangerous pattern in: {arg}"
                );
            }
        }
    }

    mod url_validation {
        use super::*;

        #[test]
        fn accepts_http_and_https() {
            assert!(SecureArgParser::validate_url("https://example.com").is_ok());
            assert!(SecureArgParser::validate_url("http://example.com").is_ok());
        }

        #[test]
        fn rejects_other_schemes() {
            assert!(matches!(
                SecureArgParser::validate_url("ftp://example.com"),
                Err(ParseError::InvalidValue { .. })
            ));
        }
    }

    mod config_path {
        use super::*;

        #[test]
        fn rejects_missing_file() {
            assert!(matches!(
                SecureArgParser::validate_config_path("/nonexistent/path/worker.toml"),
                Err(ParseError::PathNotFound(_))
            ));
        }
    }
}
