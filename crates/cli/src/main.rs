//! Contributor swag CLI - database migrations and data import.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! swag-cli migrate
//!
//! # Copy contributor records from the legacy GraphQL service
//! swag-cli import-contributors --source-url https://legacy.example/graphql --token "$TOKEN"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `import-contributors` - Upsert records from the legacy service

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "swag-cli")]
#[command(author, version, about = "Contributor swag operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Import contributor records from the legacy GraphQL service
    ImportContributors {
        /// GraphQL endpoint of the legacy service
        #[arg(long)]
        source_url: String,

        /// Bearer token for the legacy service
        #[arg(long, env = "LEGACY_API_TOKEN", hide_env_values = true)]
        token: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::ImportContributors { source_url, token } => {
            let token = SecretString::from(token);
            let report = commands::import::contributors(&source_url, &token).await?;
            tracing::info!(
                imported = report.imported,
                skipped = report.skipped,
                "Import finished"
            );
        }
    }
    Ok(())
}
