//! bayeux CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use bayeux_client::cli::{Cli, Command, ConfigAction};
use bayeux_client::commands;
use bayeux_client::config::ClientConfig;
use bayeux_client::error::ClientResult;
use bayeux_client::tracing::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(cli.tracing_config(config.debug)) {
        eprintln!("warning: {}", e);
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    if let Some(ref url) = cli.url {
        config.server.url = Some(url.clone());
        config.server.path = String::new();
    }
    Ok(config)
}

async fn run(command: Command, config: &ClientConfig) -> ClientResult<()> {
    match command {
        Command::Listen {
            channels,
            no_long_polling,
        } => commands::listen::run(config, &channels, !no_long_polling).await,
        Command::Publish { channel, data } => commands::publish::run(config, &channel, &data).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
