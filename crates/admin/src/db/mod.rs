//! Database operations for admin `PostgreSQL`.
//!
//! # Database: `tienda_admin` (SEPARATE from storefront)
//!
//! Products, orders and users live in the commerce backend. The admin
//! database only holds:
//!
//! ## Tables
//!
//! - `admin.session` - Admin session storage
//! - `admin.audit_log` - One row per admin mutation
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p tienda-cli -- migrate admin
//! ```

pub mod audit_log;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use audit_log::{AuditAction, AuditEntry, AuditLogRepository, NewAuditEntry};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
