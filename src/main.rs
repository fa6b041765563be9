use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use todo_api::{config::AppConfig, db, logging, seed, Services};

/// Multi-user to-do list backend
#[derive(Parser)]
#[command(name = "todo_api")]
#[command(about = "Multi-user to-do list HTTP API")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default)
    Run,
    /// Load configuration, open the database and apply migrations
    Check,
    /// Insert demo users and todos
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_layered(cli.config.as_deref())?;
    config.apply_cli_overrides(cli.port, cli.verbose);

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    logging::init(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "todo_api starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => todo_api::run_server(&config).await,
        Commands::Check => {
            db::connect(&config.database)
                .await
                .context("database check failed")?;
            println!("configuration OK");
            Ok(())
        }
        Commands::Seed => {
            let pool = db::connect(&config.database).await?;
            let created = seed::seed_data(&Services::new(pool, &config), &config.users).await?;
            println!("seeded {created} demo user(s)");
            Ok(())
        }
    }
}
