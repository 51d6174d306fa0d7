//! emag-desk CLI - order/offer sync and profitability calculator for eMAG
//! marketplace sellers.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::calc::CalcAction;
use crate::commands::estimate::EstimateArgs;
use crate::commands::integration::IntegrationAction;
use crate::commands::shared::{OutputFormat, open_database};
use crate::commands::sync::SyncArgs;

#[derive(Parser)]
#[command(name = "emag-desk")]
#[command(version)]
#[command(about = "Order sync and profitability calculator for eMAG marketplace sellers")]
#[command(
    long_about = "emag-desk imports orders and product offers from one or more eMAG \
Marketplace seller accounts (Romania, Bulgaria, Hungary) into a local database, \
and compares the profit of an offer when fulfilled by the merchant (with or \
without Genius) or by eMAG."
)]
#[command(after_long_help = r#"EXAMPLES
    Register a seller account and check its credentials:
        $ emag-desk integration add shop-ro --region ro -u seller@example.com -p secret --verify

    Import new orders and all offers for every account:
        $ emag-desk sync

    Re-import every order of one account, without writing anything:
        $ emag-desk sync -i shop-ro --orders --full --dry-run

    Compare profiles for an imported offer:
        $ emag-desk calc run emag:shop-ro:4512

    Quick calculation from scratch:
        $ emag-desk calc run --price 149.99 --cost 62 --commission 15

    Project 250 units split 50/20/30:
        $ emag-desk estimate saved:blender --units 250 --shares 50,20,30

CONFIGURATION
    emag-desk reads configuration from:
      1. ~/.config/emag-desk/config.toml (or $XDG_CONFIG_HOME/emag-desk/config.toml)
      2. ./emag-desk.toml
      3. Environment variables (EMAG_DESK_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    EMAG_DESK_DATABASE_URL    Database connection string (default: ~/.local/state/emag-desk/emag-desk.db)
    RUST_LOG                  Log filter when output is not a terminal
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage seller accounts
    Integration {
        #[command(subcommand)]
        action: IntegrationAction,
    },
    /// Import orders and product offers
    Sync(SyncArgs),
    /// Show the sync status of every integration
    Status {
        /// Reset a stuck integration (name or id) to idle
        #[arg(long, value_name = "NAME")]
        reset: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Profitability calculator
    Calc {
        #[command(subcommand)]
        action: CalcAction,
    },
    /// Project sales and profit across the fulfilment profiles
    Estimate(EstimateArgs),
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Drop all tables and reapply migrations
    Fresh {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a terminal; the
    // interactive reporter owns the screen otherwise.
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("emag_desk=info,emag_desk_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // config file -> env vars -> defaults
    let config = config::Config::load();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("Cannot determine a database location; set EMAG_DESK_DATABASE_URL")?;

    match cli.command {
        Commands::Integration { action } => {
            let db = open_database(&database_url).await?;
            commands::integration::handle_integration(action, &config, &db).await?;
        }
        Commands::Sync(args) => {
            let shutdown = shutdown::setup_shutdown_handler();
            commands::sync::handle_sync(args, &config, &database_url, shutdown).await?;
        }
        Commands::Status { reset, output } => {
            let db = open_database(&database_url).await?;
            commands::status::handle_status(reset, output, db).await?;
        }
        Commands::Calc { action } => {
            let db = open_database(&database_url).await?;
            commands::calc::handle_calc(action, &config, &db).await?;
        }
        Commands::Estimate(args) => {
            let db = open_database(&database_url).await?;
            commands::estimate::handle_estimate(args, &config, &db).await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn status_reset_parses() {
        let cli = Cli::parse_from(["emag-desk", "status", "--reset", "shop-ro"]);
        assert!(matches!(
            cli.command,
            Commands::Status { reset: Some(ref name), .. } if name == "shop-ro"
        ));
    }
}
