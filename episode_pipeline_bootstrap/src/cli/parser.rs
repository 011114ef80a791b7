// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap.
//!
//! This module defines the CLI structure and handles argument parsing.
//! Security validation happens in the validator module after parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Main CLI structure
#[derive(Parser, Debug, Clone)]
#[command(name = "episode-pipeline-worker")]
#[command(about = concat!("Episode ingestion worker v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML), layered under environment variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the worker: poll the queue and serve the HTTP surface until shutdown
    Serve,

    /// Submit a single work item directly, bypassing the queue
    Submit {
        /// Source video URL
        #[arg(long)]
        url: String,

        /// Channel name, for fresh ingestion (mutually exclusive with episode-id)
        #[arg(long)]
        channel_name: Option<String>,

        /// Episode title, for fresh ingestion (mutually exclusive with episode-id)
        #[arg(long)]
        episode_title: Option<String>,

        /// Known episode id, for caller-driven reprocessing
        #[arg(long)]
        episode_id: Option<Uuid>,

        /// Reprocess even if the catalog row is already marked done
        #[arg(long)]
        force_reprocess: bool,
    },

    /// Run a standalone integrity scan of catalog rows against artifact presence
    Validate {
        /// Restrict the scan to a single episode id; scans every row if omitted
        #[arg(long)]
        episode_id: Option<Uuid>,
    },
}

/// Parse CLI arguments
///
/// # Panics
///
/// Clap will exit the process with an appropriate error message if parsing
/// fails.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve() {
        let cli = Cli::parse_from(["episode-pipeline-worker", "serve"]);
        assert!(matches!(cli.command, Commands::Serve));
    }

    #[test]
    fn parses_submit_with_channel_and_title() {
        let cli = Cli::parse_from([
            "episode-pipeline-worker",
            "submit",
            "--url",
            "https://example.com/watch?v=abc",
            "--channel-name",
            "Some Channel",
            "--episode-title",
            "Some Episode",
        ]);
        match cli.command {
            Commands::Submit {
                url,
                channel_name,
                episode_title,
                episode_id,
                force_reprocess,
            } => {
                assert_eq!(url, "https://example.com/watch?v=abc");
                assert_eq!(channel_name.as_deref(), Some("Some Channel"));
                assert_eq!(episode_title.as_deref(), Some("Some Episode"));
                assert!(episode_id.is_none());
                assert!(!force_reprocess);
            }
            other => panic!("expected Submit, got {other:?}"),
        }
    }

    #[test]
    fn parses_validate_with_episode_id() {
        let id = Uuid::new_v4();
        let cli = Cli::parse_from(["episode-pipeline-worker", "validate", "--episode-id", &id.to_string()]);
        match cli.command {
            Commands::Validate { episode_id } => assert_eq!(episode_id, Some(id)),
            other => panic!("expected Validate, got {other:?}"),
        }
    }
}
