//! cwlogs-tail - Tail AWS CloudWatch Logs streams
//!
#![doc = "Main entry point for the cwlogs-tail command-line tool."]

use anyhow::Result;

use cwlogs_tail::cli::{Cli, Commands};
use cwlogs_tail::commands;
use cwlogs_tail::config::Config;
use cwlogs_tail::logging::{bootstrap_subscriber, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; its warnings go through a temporary subscriber
    let config_path = cli.config.as_deref().unwrap_or("config/cwlogs-tail.yaml");
    let bootstrap_level = if cli.verbose { "debug" } else { "warn" };
    let config = tracing::subscriber::with_default(bootstrap_subscriber(bootstrap_level), || {
        Config::load(config_path, &cli)
    })?;

    // Initialize logging from the loaded configuration
    init_logging(&config.logging)?;
    tracing::debug!(config = %config_path, "Configuration loaded");

    // Validate configuration before any remote client is built
    config.validate()?;

    match cli.command {
        Commands::Run { once, dry_run } => {
            tracing::info!(
                log_group = %config.input.log_group_name,
                once,
                dry_run,
                "Starting cwlogs-tail"
            );
            commands::r#run::run_tail(config, once, dry_run).await?;
            Ok(())
        }
        Commands::Check => {
            commands::check::run_check(&config)?;
            Ok(())
        }
        Commands::Cursor { stream } => {
            commands::inspect::show_cursor(&config, stream)?;
            Ok(())
        }
    }
}
