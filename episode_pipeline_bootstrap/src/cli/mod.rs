// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parser::parse_cli()             │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

pub mod parser;
pub mod validator;

pub use parser::{parse_cli, Cli, Commands};
pub use validator::{ParseError, SecureArgParser};

use std::path::PathBuf;
use uuid::Uuid;

/// Validated CLI configuration
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
}

/// Validated command variants
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Serve,
    Submit {
        url: String,
        channel_name: Option<String>,
        episode_title: Option<String>,
        episode_id: Option<Uuid>,
        force_reprocess: bool,
    },
    Validate {
        episode_id: Option<Uuid>,
    },
}

/// Parse and validate CLI arguments
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = parse_cli();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = match cli.config {
        Some(path) => Some(SecureArgParser::validate_config_path(&path.to_string_lossy())?),
        None => None,
    };

    let command = match cli.command {
        Commands::Serve => ValidatedCommand::Serve,
        Commands::Submit {
            url,
            channel_name,
            episode_title,
            episode_id,
            force_reprocess,
        } => {
            SecureArgParser::validate_url(&url)?;

            if let Some(ref name) = channel_name {
                SecureArgParser::validate_argument(name)?;
            }
            if let Some(ref title) = episode_title {
                SecureArgParser::validate_argument(title)?;
            }

            if episode_id.is_none() && (channel_name.is_none() || episode_title.is_none()) {
                return Err(ParseError::InvalidValue {
                    arg: "submit".to_string(),
                    reason: "either --episode-id, or both --channel-name and --episode-title, are required"
                        .to_string(),
                });
            }

            ValidatedCommand::Submit {
                url,
                channel_name,
                episode_title,
                episode_id,
                force_reprocess,
            }
        }
        Commands::Validate { episode_id } => ValidatedCommand::Validate { episode_id },
    };

    Ok(ValidatedCli {
        command,
        verbose: cli.verbose,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_requires_episode_id_or_channel_and_title() {
        let cli = Cli {
            command: Commands::Submit {
                url: "https://example.com/v".to_string(),
                channel_name: None,
                episode_title: None,
                episode_id: None,
                force_reprocess: false,
            },
            verbose: false,
            config: None,
        };

        assert!(matches!(validate_cli(cli), Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn submit_with_episode_id_alone_is_valid() {
        let cli = Cli {
            command: Commands::Submit {
                url: "https://example.com/v".to_string(),
                channel_name: None,
                episode_title: None,
                episode_id: Some(Uuid::new_v4()),
                force_reprocess: true,
            },
            verbose: false,
            config: None,
        };

        let validated = validate_cli(cli).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::Submit { force_reprocess: true, .. }));
    }

    #[test]
    fn serve_needs_no_extra_validation() {
        let cli = Cli {
            command: Commands::Serve,
            verbose: true,
            config: None,
        };

        let validated = validate_cli(cli).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::Serve));
        assert!(validated.verbose);
    }
}
