//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Health check
//!
//! # Catalog
//! GET  /products               - Product listing (?q, ?category, ?page)
//! GET  /products/{id}          - Product detail
//! GET  /categories/{id}        - Products in a category
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (notice fragment, triggers cart-updated)
//! POST /cart/update            - Update quantity (cart_items fragment)
//! POST /cart/remove            - Remove line (cart_items fragment)
//! POST /cart/clear             - Empty the cart (cart_items fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout (requires auth, rate limited)
//! GET  /checkout               - Shipping and payment form
//! POST /checkout               - Create order and start payment
//!
//! # Payments (requires auth)
//! GET  /payments/{client_tx}         - Payment status page
//! GET  /payments/{client_tx}/status  - Polling fragment (HTMX)
//! POST /payments/{client_tx}/proof   - Deposit proof
//! POST /payments/{client_tx}/retry   - New attempt for a failed payment
//! GET  /payments/payphone/return     - Payphone response URL
//! GET  /payments/mercadopago/return  - Mercado Pago back URL
//!
//! # Webhooks
//! POST /webhooks/mercadopago   - Mercado Pago notifications
//!
//! # Auth (POST rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # Account (requires auth)
//! GET  /account                - Order history
//! GET  /account/orders         - Order history
//! GET  /account/orders/{id}    - Order detail
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod home;
pub mod payments;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(auth_rate_limiter())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(auth_rate_limiter())),
        )
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the payment routes router.
///
/// The provider return paths are static segments, which axum matches
/// before the `{client_tx}` capture.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payphone/return", get(payments::payphone_return))
        .route("/mercadopago/return", get(payments::mercadopago_return))
        .route("/{client_tx}", get(payments::show))
        .route("/{client_tx}/status", get(payments::status))
        .route(
            "/{client_tx}/proof",
            post(payments::proof).layer(checkout_rate_limiter()),
        )
        .route(
            "/{client_tx}/retry",
            post(payments::retry).layer(checkout_rate_limiter()),
        )
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::orders))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .nest("/products", product_routes())
        .route("/categories/{id}", get(categories::show))
        // Cart
        .nest("/cart", cart_routes())
        // Checkout
        .route(
            "/checkout",
            get(checkout::show).merge(post(checkout::submit).layer(checkout_rate_limiter())),
        )
        // Payments
        .nest("/payments", payment_routes())
        .route("/webhooks/mercadopago", post(webhooks::mercadopago))
        // Account
        .nest("/account", account_routes())
        // Auth
        .nest("/auth", auth_routes())
}
