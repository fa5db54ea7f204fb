//! Domain models for storefront.
//!
//! Business entities live in the commerce backend (see `tienda_core::models`);
//! this module only holds what the storefront keeps in the session.

pub mod session;

pub use session::{CurrentCustomer, Flash, FlashKind, keys as session_keys};
