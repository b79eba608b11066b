//! Handbook CLI entry point.

use anyhow::Result;
use clap::Parser;
use handbook::cli::{commands, Cli, Commands};
use handbook::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| settings.general.log_directive(cli.verbose)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Commands::Config { action } = &cli.command {
        return commands::run_config(action, config_path, settings);
    }
    if let Commands::Doctor = &cli.command {
        return commands::run_doctor(&settings);
    }

    settings.validate()?;

    // Ensure data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Ingest { dir, force } => {
            commands::run_ingest(dir, force, settings).await?;
        }

        Commands::Add { file } => {
            commands::run_add(&file, settings).await?;
        }

        Commands::Update { dir } => {
            commands::run_update(dir, settings).await?;
        }

        Commands::Ask { question, mmr } => {
            commands::run_ask(&question, mmr, settings).await?;
        }

        Commands::Chat { mmr } => {
            commands::run_chat(mmr, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            mmr,
            file,
        } => {
            commands::run_search(&query, limit, mmr, file, settings).await?;
        }

        Commands::Status => {
            commands::run_status(settings).await?;
        }

        Commands::Reset { yes } => {
            commands::run_reset(yes, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(&host, port, settings).await?;
        }

        Commands::Doctor | Commands::Config { .. } => {}
    }

    Ok(())
}
