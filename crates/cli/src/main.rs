//! Shopfront CLI - Database migrations and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Run accounts database migrations
//! shopfront migrate accounts
//!
//! # Create the storefront session table
//! shopfront migrate storefront
//!
//! # Run all database migrations
//! shopfront migrate all
//!
//! # Validate the product catalog and its images
//! shopfront catalog check crates/storefront/content/products.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Inspect the product catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run accounts database migrations
    Accounts,
    /// Create the storefront session table
    Storefront,
    /// Run all database migrations
    All,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Load a catalog file and check every product image exists
    Check {
        /// Catalog JSON file
        path: PathBuf,

        /// Directory served at `/static`
        #[arg(long, default_value = shopfront_storefront::STATIC_DIR)]
        static_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

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
        Commands::Migrate { target } => match target {
            MigrateTarget::Accounts => commands::migrate::accounts().await?,
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
            MigrateTarget::All => {
                commands::migrate::accounts().await?;
                commands::migrate::storefront().await?;
            }
        },
        Commands::Catalog { action } => match action {
            CatalogAction::Check { path, static_dir } => {
                commands::catalog::check(&path, &static_dir)?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_catalog_check() {
        let cli = Cli::try_parse_from(["shopfront", "catalog", "check", "products.json"]).unwrap();
        match cli.command {
            Commands::Catalog {
                action: CatalogAction::Check { path, static_dir },
            } => {
                assert_eq!(path, PathBuf::from("products.json"));
                assert_eq!(static_dir, PathBuf::from(shopfront_storefront::STATIC_DIR));
            }
            Commands::Migrate { .. } => panic!("expected catalog command"),
        }
    }

    #[test]
    fn test_parse_migrate_targets() {
        for target in ["accounts", "storefront", "all"] {
            assert!(Cli::try_parse_from(["shopfront", "migrate", target]).is_ok());
        }
        assert!(Cli::try_parse_from(["shopfront", "migrate", "orders"]).is_err());
    }
}
