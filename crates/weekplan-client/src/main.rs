//! weekplan CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use weekplan_client::cli::{Cli, Command, ConfigAction};
use weekplan_client::commands;
use weekplan_client::config::ClientConfig;
use weekplan_client::error::ClientResult;
use weekplan_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path)?
    } else {
        ClientConfig::load()?
    };

    match &cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
        Command::Users { search } => {
            let session = commands::connect(&cli, &config)?;
            commands::users::run(&session, search.as_deref()).await
        }
        Command::Calendars { all } => {
            let session = commands::connect(&cli, &config)?;
            commands::calendars::run(&session, *all).await
        }
        Command::Week { users, week, json } => {
            let session = commands::connect(&cli, &config)?;
            commands::week::run(&session, users, *week, *json).await
        }
    }
}
