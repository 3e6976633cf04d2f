use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rota_cli::commands::{board, presence, remove_event, shift, watch};
use rota_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Board(args)) => {
            let config = load_config(cli.config.as_deref())?;
            board::run(&mut out, &config, args).await?;
        }
        Some(Commands::Shift {
            shift_id,
            day,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            shift::run(&mut out, &config, shift_id, day, *json).await?;
        }
        Some(Commands::Presence {
            day,
            job_titles,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            presence::run(&mut out, &config, day, job_titles, *json).await?;
        }
        Some(Commands::RemoveEvent { event_id }) => {
            let config = load_config(cli.config.as_deref())?;
            remove_event::run(&mut out, &config, event_id).await?;
        }
        Some(Commands::Watch { board, once }) => {
            let config = load_config(cli.config.as_deref())?;
            watch::run(&mut out, &config, board, *once).await?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    out.flush()?;
    Ok(())
}
