/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Eitri CLI application
//!
//! Command-line entry point: serves the job and live log API, or manages secrets.

use eitri_server::cli::{commands, parse_cli, Commands, SecretSubcommands};
use eitri_utils::config::Settings;
use eitri_utils::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_cli();

    let config = Settings::new(cli.config.clone())?;

    telemetry::init(
        &config.telemetry.for_server(),
        &config.log.level,
        &config.log.format,
    )?;

    let result = match cli.command {
        Commands::Serve => commands::serve(&config).await,
        Commands::Secret(secret) => match secret.command {
            SecretSubcommands::Set {
                application,
                name,
                value,
            } => commands::set_secret(&config, application, &name, &value),
        },
    };

    telemetry::shutdown();
    result
}
