//! Payment provider clients.
//!
//! - [`payphone`] - card payment links and phone push sales
//! - [`mercado_pago`] - Checkout Pro preferences, payment lookups and
//!   webhook signature checks
//!
//! Both map provider answers to [`tienda_core::Observation`]s; the state
//! machine in `tienda_core::payment` decides what they mean for an attempt.

pub mod mercado_pago;
pub mod payphone;

pub use mercado_pago::{MercadoPagoClient, MercadoPagoError, MercadoPagoPayment, PreferenceUrls};
pub use payphone::{PayphoneAmounts, PayphoneClient, PayphoneError, PayphoneTransaction};
