//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Health check
//! GET  /health/ready               - Readiness (database)
//!
//! # Dashboard
//! GET  /                           - Sales overview, verification queue, activity
//!
//! # Auth (backend credentials, admin role only)
//! GET  /auth/login                 - Login page
//! POST /auth/login                 - Login action
//! POST /auth/logout                - Logout
//!
//! # Products
//! GET  /products                   - Product listing (?q, ?category, ?page)
//! GET  /products/new               - New product form
//! POST /products                   - Create product
//! GET  /products/{id}/edit         - Edit product form
//! POST /products/{id}              - Update product
//! POST /products/{id}/delete       - Delete product
//!
//! # Categories
//! GET  /categories                 - Category listing with inline forms
//! POST /categories                 - Create category
//! POST /categories/{id}            - Update category
//! POST /categories/{id}/delete     - Delete category
//!
//! # Users
//! GET  /users                      - User listing (?page)
//! POST /users/{id}/role            - Change role
//! POST /users/{id}/active          - Activate or deactivate
//!
//! # Orders
//! GET  /orders                     - Order listing (?status, ?page)
//! GET  /orders/{id}                - Order detail with audit history
//! POST /orders/{id}/status         - Move to the next status
//! POST /orders/{id}/verify         - Approve or reject a deposit proof
//! ```
//!
//! Every mutation is recorded in the audit log and answered with a flash
//! message on the redirected page.

pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::{AuditAction, NewAuditEntry};
use crate::models::CurrentAdmin;
use crate::state::AppState;

/// Rows per admin list page.
pub const PER_PAGE: u32 = 20;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/new", get(products::new_page))
        .route("/{id}", post(products::update))
        .route("/{id}/edit", get(products::edit_page))
        .route("/{id}/delete", post(products::delete))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route("/{id}", post(categories::update))
        .route("/{id}/delete", post(categories::delete))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index))
        .route("/{id}/role", post(users::change_role))
        .route("/{id}/active", post(users::set_active))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::update_status))
        .route("/{id}/verify", post(orders::verify_payment))
}

/// Create all routes for the admin panel.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/users", user_routes())
        .nest("/orders", order_routes())
}

/// Append an audit entry for a mutation that already happened.
///
/// The backend change cannot be rolled back, so a failed insert is reported
/// to Sentry and logged instead of failing the request.
pub(crate) async fn record_audit(
    state: &AppState,
    admin: &CurrentAdmin,
    action: AuditAction,
    target_id: i64,
    details: Option<String>,
) {
    let entry = NewAuditEntry {
        admin_id: admin.id,
        admin_email: admin.email.as_str(),
        action,
        target_id,
        details,
    };
    match state.audit_log().record(&entry).await {
        Ok(id) => tracing::info!(
            audit_id = %id,
            admin_id = %admin.id,
            action = %action,
            target_id,
            "Admin action recorded"
        ),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                action = %action,
                target_id,
                "Failed to write audit log entry"
            );
        }
    }
}
