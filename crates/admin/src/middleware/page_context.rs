//! Layout data for `base.html`.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::auth::OptionalAdminAuth;
use super::flash::FlashMessage;
use crate::models::Flash;

/// Layout data shared by all full pages.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub admin_name: Option<String>,
    pub flash: Option<Flash>,
    /// Path of the current request, for highlighting the nav.
    pub path: String,
}

impl PageContext {
    /// Context for pages rendered outside a handler (error pages).
    #[must_use]
    pub fn bare() -> Self {
        Self::default()
    }

    /// Whether a nav link for `prefix` should be marked active.
    #[must_use]
    pub fn is_active(&self, prefix: &str) -> bool {
        if prefix == "/" {
            self.path == "/"
        } else {
            self.path.starts_with(prefix)
        }
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAdminAuth(admin) = OptionalAdminAuth::from_request_parts(parts, state).await?;
        let FlashMessage(flash) = FlashMessage::from_request_parts(parts, state).await?;
        Ok(Self {
            admin_name: admin.map(|a| a.name),
            flash,
            path: parts.uri.path().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        let ctx = PageContext {
            path: "/orders/12".to_string(),
            ..PageContext::default()
        };
        assert!(ctx.is_active("/orders"));
        assert!(!ctx.is_active("/"));
        assert!(!ctx.is_active("/products"));
    }
}
