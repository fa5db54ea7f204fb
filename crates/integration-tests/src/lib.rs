//! Integration tests for Tienda.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! cargo run -p tienda-cli -- migrate all
//!
//! # Start both servers, then run the ignored tests
//! cargo test -p tienda-integration-tests -- --ignored
//! ```
//!
//! # Environment
//!
//! - `STOREFRONT_URL` (default `http://localhost:3000`)
//! - `ADMIN_URL` (default `http://localhost:3001`)
//! - `STOREFRONT_DATABASE_URL` or `DATABASE_URL` for repository tests
//! - `ADMIN_TEST_EMAIL` / `ADMIN_TEST_PASSWORD` for signed-in admin tests
//! - `STOREFRONT_TEST_EMAIL` / `STOREFRONT_TEST_PASSWORD` for signed-in customer tests
//!
//! # Test Categories
//!
//! - `storefront_http` - Storefront pages, cart, checkout guard, webhook
//! - `admin_http` - Admin login and protected pages
//! - `payment_attempts` - Payment attempt repository against `PostgreSQL`
//! - `payment_polling` - Status polling against `PostgreSQL` with no provider answer
//! - `checkout_tokens` - Checkout token claims and purge against `PostgreSQL`

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

/// Base URL of the running storefront.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL of the running admin panel.
#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A client that keeps cookies and does not follow redirects, so tests can
/// assert on `Location`.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Admin credentials from the environment, if provided.
#[must_use]
pub fn admin_credentials() -> Option<(String, SecretString)> {
    let email = std::env::var("ADMIN_TEST_EMAIL").ok()?;
    let password = std::env::var("ADMIN_TEST_PASSWORD").ok()?;
    Some((email, SecretString::from(password)))
}

/// Sign `client` into the admin panel.
///
/// Returns false when the admin rejected the credentials.
///
/// # Panics
///
/// Panics if the admin server is unreachable.
#[allow(clippy::expect_used)]
pub async fn admin_login(client: &Client, email: &str, password: &SecretString) -> bool {
    let response = client
        .post(format!("{}/auth/login", admin_url()))
        .form(&[("email", email), ("password", password.expose_secret())])
        .send()
        .await
        .expect("Failed to reach admin");
    response.status().is_redirection()
        && response
            .headers()
            .get(reqwest::header::LOCATION)
            .is_some_and(|l| l == "/")
}

/// Pool for the storefront database.
///
/// # Panics
///
/// Panics if no database URL is configured or the connection fails.
#[allow(clippy::expect_used)]
pub async fn storefront_pool() -> PgPool {
    PgPool::connect(&storefront_database_url())
        .await
        .expect("Failed to connect to storefront database")
}

/// Storefront database URL from the environment.
///
/// # Panics
///
/// Panics if neither variable is set.
#[must_use]
#[allow(clippy::expect_used)]
pub fn storefront_database_url() -> String {
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL or DATABASE_URL must be set")
}

/// Customer credentials from the environment, if provided.
#[must_use]
pub fn customer_credentials() -> Option<(String, SecretString)> {
    let email = std::env::var("STOREFRONT_TEST_EMAIL").ok()?;
    let password = std::env::var("STOREFRONT_TEST_PASSWORD").ok()?;
    Some((email, SecretString::from(password)))
}

/// Sign `client` into the storefront.
///
/// Returns false when the backend rejected the credentials.
///
/// # Panics
///
/// Panics if the storefront is unreachable.
#[allow(clippy::expect_used)]
pub async fn customer_login(client: &Client, email: &str, password: &SecretString) -> bool {
    let response = client
        .post(format!("{}/auth/login", storefront_url()))
        .form(&[("email", email), ("password", password.expose_secret())])
        .send()
        .await
        .expect("Failed to reach storefront");
    response.status().is_redirection()
}
