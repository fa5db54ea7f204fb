//! Tienda Core - Shared types library.
//!
//! This crate provides common types used across all Tienda components:
//! - `backend` - REST client for the commerce backend
//! - `storefront` - Public-facing e-commerce site
//! - `admin` - Internal administration panel
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`models`] - Wire models exchanged with the commerce backend
//! - [`cart`] - Session cart with merge/reprice rules
//! - [`payment`] - Client transaction IDs and the payment reconciliation state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod models;
pub mod payment;
pub mod types;

pub use cart::{Cart, CartLine, RepriceReport};
pub use payment::{
    ClientTransactionId, Observation, PaymentPhase, PollDecision, PollPolicy, Transition,
};
pub use types::*;
