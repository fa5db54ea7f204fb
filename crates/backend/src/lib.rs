//! Tienda Backend - REST client for the commerce backend.
//!
//! The backend owns every durable business record: products, categories,
//! orders and users. Both web binaries talk to it exclusively through
//! [`BackendClient`].
//!
//! # Architecture
//!
//! - JSON over HTTP, bearer token on authenticated calls
//! - Catalog reads are cached in memory via `moka` (5 minute TTL)
//! - Admin catalog writes go through the same client and call
//!   [`BackendClient::invalidate_catalog`]
//!
//! # Example
//!
//! ```rust,ignore
//! use tienda_backend::{BackendClient, BackendConfig, ProductQuery};
//!
//! let client = BackendClient::new(&BackendConfig::new(url, Duration::from_secs(15)))?;
//! let page = client.list_products(&ProductQuery::default()).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod auth;
mod cache;
mod catalog;
mod client;
mod error;
mod orders;
mod users;

pub use catalog::ProductQuery;
pub use client::{BackendClient, BackendConfig};
pub use error::BackendError;
