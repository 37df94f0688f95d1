//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stagehand - stage-promotion deployment orchestrator.
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "STAGEHAND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Credentials profile to fall back to.
    #[arg(long, global = true, env = "STAGEHAND_PROFILE")]
    pub profile: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision or update infrastructure for a stage or an account.
    DeployInfra {
        /// Stage to deploy infrastructure for.
        #[arg(long)]
        stage: Option<String>,

        /// Account to deploy baseline infrastructure for.
        #[arg(long)]
        account: Option<String>,

        /// Preview the proposed changes without applying anything.
        #[arg(long)]
        dry_run: bool,

        /// Destroy and recreate the stack instead of updating it.
        #[arg(long)]
        recreate: bool,

        /// Override the protected-stack check (use with caution).
        #[arg(long)]
        force: bool,

        /// Issue the operation without waiting for it to finish.
        #[arg(long = "async")]
        asynchronous: bool,
    },

    /// Release a service to a stage.
    Release {
        /// Service to release.
        #[arg(long)]
        service: String,

        /// Stage to release to.
        #[arg(long)]
        stage: String,

        /// Code archive to release (overrides the configured artifact).
        #[arg(long)]
        zip: Option<PathBuf>,

        /// Stage the archive through the build bucket instead of uploading
        /// it inline.
        #[arg(long)]
        via_bucket: bool,
    },

    /// Write configuration parameters under the stage's `latest` namespace.
    PutParameters {
        /// Service the parameters belong to.
        #[arg(long)]
        service: String,

        /// Stage the parameters belong to.
        #[arg(long)]
        stage: String,

        /// `KEY=VALUE` pairs to write.
        #[arg(value_parser = parse_key_value, required = true)]
        parameters: Vec<(String, String)>,
    },

    /// Show the live configuration of a service for a stage.
    ShowService {
        /// Service to show.
        #[arg(long)]
        service: String,

        /// Stage to show the configuration for.
        #[arg(long)]
        stage: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Parses one `KEY=VALUE` argument.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{raw}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("DB_HOST=db.internal"),
            Ok((String::from("DB_HOST"), String::from("db.internal")))
        );
        assert_eq!(
            parse_key_value("TOKEN=a=b"),
            Ok((String::from("TOKEN"), String::from("a=b")))
        );
        assert!(parse_key_value("NO_EQUALS").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_cli_parses_release_command() {
        let cli = Cli::try_parse_from([
            "stagehand",
            "release",
            "--service",
            "billing",
            "--stage",
            "dev",
        ])
        .unwrap();

        match cli.command {
            Commands::Release { service, stage, zip, via_bucket } => {
                assert_eq!(service, "billing");
                assert_eq!(stage, "dev");
                assert!(zip.is_none());
                assert!(!via_bucket);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_missing_pairs_for_put_parameters() {
        assert!(Cli::try_parse_from([
            "stagehand",
            "put-parameters",
            "--service",
            "billing",
            "--stage",
            "dev",
        ])
        .is_err());
    }
}
