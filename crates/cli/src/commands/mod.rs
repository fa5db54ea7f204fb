//! Subcommand implementations.

pub mod checkout_tokens;
pub mod migrate;
pub mod payments;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;
use tienda_storefront::db::RepositoryError;

/// Errors from CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0} (or DATABASE_URL)")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository query failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

/// Read `primary`, falling back to `DATABASE_URL`.
fn database_url(primary: &'static str) -> Result<SecretString, CliError> {
    std::env::var(primary)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar(primary))
}

/// Connect using `primary` (or `DATABASE_URL`).
async fn connect(primary: &'static str) -> Result<PgPool, CliError> {
    let url = database_url(primary)?;
    tracing::info!(var = primary, "Connecting to database...");
    Ok(tienda_storefront::db::create_pool(&url).await?)
}
