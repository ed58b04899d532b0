mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tenderwatch")]
#[command(about = "Harvest Taiwan government e-procurement declarations and notify subscribers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape newly published declarations into SQLite
    Ingest(commands::ingest::IngestArgs),
    /// Email subscribers a digest of matching declarations
    Notify(commands::notify::NotifyArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tenderwatch_lib=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Ingest(args) => commands::ingest::run(args).await?,
        Commands::Notify(args) => commands::notify::run(args)?,
    }

    Ok(())
}
