//! Scorecast CLI entry point

use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tracing::info;

use scorecast_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig, error::Result, shell};
use scorecast_runtime::{Console, GameClient, TcpConnector};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = load_configuration(&cli)?;

    // Initialize logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level()?
    };
    setup_logging(log_level);

    let client = GameClient::new(
        Arc::new(TcpConnector),
        config.client.clone(),
        Console::stdout(),
    );
    let mut dispatcher = CommandDispatcher::new(client);

    let stdin = BufReader::new(tokio::io::stdin());
    shell::run(&mut dispatcher, stdin, &config.shell.prompt).await?;

    info!("Scorecast exited");
    Ok(())
}

/// Setup logging on stderr, leaving stdout to user-facing messages
fn setup_logging(log_level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(config_path) => Ok(AppConfig::load_from_file(config_path)?),
        None => Ok(AppConfig::default()),
    }
}
