//! Tienda CLI - Database migrations and payment maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! tienda-cli migrate storefront
//!
//! # Run admin database migrations
//! tienda-cli migrate admin
//!
//! # Run all database migrations
//! tienda-cli migrate all
//!
//! # Expire payment attempts pending for more than two hours
//! tienda-cli payments expire --older-than-minutes 120
//!
//! # List recent payment attempts
//! tienda-cli payments list --status pending
//!
//! # Delete checkout token claims older than three days
//! tienda-cli checkout-tokens purge --older-than-hours 72
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `payments expire` - Expire stale pending attempts (run from cron)
//! - `payments list` - Inspect local payment attempts
//! - `checkout-tokens purge` - Delete old checkout token claims (run from cron)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tienda_core::PaymentStatus;

mod commands;

#[derive(Parser)]
#[command(name = "tienda-cli")]
#[command(author, version, about = "Tienda CLI tools")]
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
    /// Maintain local payment attempts
    Payments {
        #[command(subcommand)]
        action: PaymentsAction,
    },
    /// Maintain one-time checkout tokens
    CheckoutTokens {
        #[command(subcommand)]
        action: CheckoutTokensAction,
    },
}

#[derive(Subcommand)]
enum CheckoutTokensAction {
    /// Delete token claims older than the given age
    Purge {
        /// Age in hours after which a claim is deleted
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        older_than_hours: u32,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront,
    /// Run admin database migrations
    Admin,
    /// Run all database migrations
    All,
}

#[derive(Subcommand)]
enum PaymentsAction {
    /// Mark pending attempts older than the given age as expired
    Expire {
        /// Age in minutes after which a pending attempt is stale
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        older_than_minutes: u32,
    },
    /// Print recent payment attempts
    List {
        /// Only attempts in this status (e.g. `pending`, `awaiting_verification`)
        #[arg(long, value_parser = parse_status)]
        status: Option<PaymentStatus>,

        /// Maximum number of attempts to print
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

fn parse_status(s: &str) -> Result<PaymentStatus, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
            MigrateTarget::Admin => commands::migrate::admin().await?,
            MigrateTarget::All => {
                commands::migrate::storefront().await?;
                commands::migrate::admin().await?;
            }
        },
        Commands::Payments { action } => match action {
            PaymentsAction::Expire { older_than_minutes } => {
                commands::payments::expire(older_than_minutes).await?;
            }
            PaymentsAction::List { status, limit } => {
                commands::payments::list(status, limit.max(1)).await?;
            }
        },
        Commands::CheckoutTokens { action } => match action {
            CheckoutTokensAction::Purge { older_than_hours } => {
                commands::checkout_tokens::purge(older_than_hours).await?;
            }
        },
    }
    Ok(())
}
