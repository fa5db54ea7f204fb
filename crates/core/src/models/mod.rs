//! Wire models exchanged with the commerce backend.
//!
//! The backend is the source of truth for everything here; the UIs only
//! render these and send the `*Input` types back.

pub mod catalog;
pub mod order;
pub mod page;
pub mod user;

pub use catalog::{Category, CategoryInput, Product, ProductInput};
pub use order::{Order, OrderInput, OrderLine, OrderLineInput, PaymentUpdate, ShippingAddress};
pub use page::Page;
pub use user::{AuthSession, User};
