//! Per-page layout context.
//!
//! Every full-page template extends `base.html`, which needs the CSP nonce,
//! the logged-in customer's name and any pending flash message. This
//! extractor gathers them in one place.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::auth::OptionalAuth;
use super::csp::CspNonce;
use super::flash::FlashMessage;
use crate::models::{CurrentCustomer, Flash};

/// Layout data shared by all full pages.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub nonce: String,
    pub customer_name: Option<String>,
    pub flash: Option<Flash>,
}

impl PageContext {
    /// Context for pages rendered outside a handler (error pages).
    #[must_use]
    pub fn bare() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.customer_name.is_some()
    }

    /// Same page, different flash.
    #[must_use]
    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    fn from_parts(nonce: CspNonce, customer: Option<&CurrentCustomer>, flash: Option<Flash>) -> Self {
        Self {
            nonce: nonce.0,
            customer_name: customer.map(|c| c.name.clone()),
            flash,
        }
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let nonce = CspNonce::from_request_parts(parts, state).await?;
        let OptionalAuth(customer) = OptionalAuth::from_request_parts(parts, state).await?;
        let FlashMessage(flash) = FlashMessage::from_request_parts(parts, state).await?;
        Ok(Self::from_parts(nonce, customer.as_ref(), flash))
    }
}
