/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

pub mod commands;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
/// Eitri CLI
///
/// Runs the job execution and live log streaming server, and manages the secrets
/// interpolated into submitted jobs.
pub struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(long, global = true, env = "EITRI_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Eitri server
    Serve,

    /// Manage application secrets
    Secret(SecretCommands),
}

#[derive(Args)]
pub struct SecretCommands {
    #[command(subcommand)]
    pub command: SecretSubcommands,
}

#[derive(Subcommand)]
pub enum SecretSubcommands {
    /// Create or replace a secret
    Set {
        /// Application the secret belongs to
        #[arg(long)]
        application: Uuid,
        /// Name referenced as {{secrets.<name>}} in job templates
        #[arg(long)]
        name: String,
        /// Plaintext value; stored encrypted
        #[arg(long)]
        value: String,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secret_set_with_global_config() {
        let app = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "eitri",
            "secret",
            "set",
            "--application",
            &app.to_string(),
            "--name",
            "API_KEY",
            "--value",
            "abc123",
            "--config",
            "/etc/eitri.toml",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some("/etc/eitri.toml"));
        match cli.command {
            Commands::Secret(SecretCommands {
                command:
                    SecretSubcommands::Set {
                        application,
                        name,
                        value,
                    },
            }) => {
                assert_eq!(application, app);
                assert_eq!(name, "API_KEY");
                assert_eq!(value, "abc123");
            }
            _ => panic!("expected secret set"),
        }
    }

    #[test]
    fn test_serve_takes_no_arguments() {
        let cli = Cli::try_parse_from(["eitri", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve));
        assert!(Cli::try_parse_from(["eitri", "serve", "extra"]).is_err());
    }
}
