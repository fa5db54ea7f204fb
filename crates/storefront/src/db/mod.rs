//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `tienda_storefront`
//!
//! Stores local data only (the commerce backend is the source of truth for
//! products, orders and users):
//!
//! ## Tables
//!
//! - `tower_sessions.session` - Session storage (cart, login, checkout tokens)
//! - `storefront.payment_attempt` - One row per client transaction ID
//! - `storefront.checkout_token` - Claimed one-time checkout submissions
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p tienda-cli -- migrate storefront
//! ```

pub mod checkout_tokens;
pub mod payment_attempts;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use checkout_tokens::{CheckoutTokenRepository, ClaimedToken};
pub use payment_attempts::{
    NewPaymentAttempt, PaymentAttempt, PaymentAttemptRepository, StatusChange,
};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A row held a value we cannot interpret.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// Expected row is missing.
    #[error("Not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
