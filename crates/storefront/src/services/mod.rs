//! Business logic services.
//!
//! - [`checkout`] - order creation and payment start
//! - [`reconcile`] - applying provider answers to payment attempts

pub mod checkout;
pub mod reconcile;

pub use checkout::{CheckoutError, CheckoutService, StartedPayment};
pub use reconcile::Reconciler;
