//! Partshop CLI - Database migrations and seeding.
//!
//! # Usage
//!
//! ```bash
//! # Create or update the shop schema
//! ps-cli migrate
//!
//! # Replace all shop data with the demo catalog, cart and order history
//! ps-cli seed --file data/products.json
//!
//! # Empty every shop table
//! ps-cli reset
//! ```
//!
//! All commands read `SHOP_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ps-cli")]
#[command(author, version, about = "Partshop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Replace shop data with the demo dataset
    Seed {
        /// Product catalog JSON file
        #[arg(short, long, default_value = "data/products.json")]
        file: PathBuf,
    },
    /// Delete all shop data and restart id sequences
    Reset,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::Reset => commands::seed::reset().await?,
    }
    Ok(())
}
