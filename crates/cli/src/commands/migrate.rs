//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! tienda-cli migrate storefront
//! tienda-cli migrate admin
//! tienda-cli migrate all
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for storefront
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string for admin
//!
//! Both fall back to `DATABASE_URL`. The two migration sets may share one
//! database, so each run ignores versions applied by the other set.

use super::{CliError, connect};

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn storefront() -> Result<(), CliError> {
    let pool = connect("STOREFRONT_DATABASE_URL").await?;

    tracing::info!("Running storefront migrations...");
    let mut migrator = sqlx::migrate!("../storefront/migrations");
    migrator.set_ignore_missing(true);
    migrator.run(&pool).await?;

    tracing::info!("Storefront migrations complete");
    Ok(())
}

/// Run admin database migrations.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn admin() -> Result<(), CliError> {
    let pool = connect("ADMIN_DATABASE_URL").await?;

    tracing::info!("Running admin migrations...");
    let mut migrator = sqlx::migrate!("../admin/migrations");
    migrator.set_ignore_missing(true);
    migrator.run(&pool).await?;

    tracing::info!("Admin migrations complete");
    Ok(())
}
