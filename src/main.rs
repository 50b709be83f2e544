use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clients;
mod commands;
mod config;
mod db;
mod mapping;
mod models;
mod sync;

use commands::{ConfigCommand, ImportCommand, RecordsCommand, RunCommand, SyncCommand};
use config::Config;
use db::init_db;

#[derive(Parser)]
#[command(name = "tenwoo")]
#[command(version)]
#[command(about = "Keeps a TEN ERP and a WooCommerce storefront in step", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull records into the local store
    Import(ImportCommand),

    /// Push pending records out
    Sync(SyncCommand),

    /// Run an import, sync or full plan
    Run(RunCommand),

    /// Maintain individual records
    Records(RecordsCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    // Initialize tracing; logs go to stderr, reports to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenwoo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Import(cmd)) => {
            let pool = init_db(config.database_path.value.clone()).await?;
            cmd.run(pool, &config).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let pool = init_db(config.database_path.value.clone()).await?;
            cmd.run(pool, &config).await?;
        }
        Some(Commands::Run(cmd)) => {
            let pool = init_db(config.database_path.value.clone()).await?;
            cmd.run(pool, &config).await?;
        }
        Some(Commands::Records(cmd)) => {
            let pool = init_db(config.database_path.value.clone()).await?;
            cmd.run(&pool).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
