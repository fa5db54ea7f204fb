//! Domain models for admin.
//!
//! Business entities come from the commerce backend (see
//! `tienda_core::models`); this module holds what the admin keeps in the
//! session.

pub mod session;

pub use session::{CurrentAdmin, Flash, FlashKind, keys as session_keys};
