//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing with status and latency)
//! 3. Security headers (strict CSP, no inline scripts)
//! 4. Session layer (tower-sessions, `SameSite=Strict`)
//!
//! Authentication is enforced per handler with [`RequireAdminAuth`].

pub mod auth;
pub mod flash;
pub mod page_context;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAdminAuth, RequireAdminAuth, clear_current_admin, set_current_admin};
pub use flash::{FlashMessage, set_flash};
pub use page_context::PageContext;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
