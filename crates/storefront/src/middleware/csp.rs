//! CSP nonce middleware for inline script protection.
//!
//! Generates a unique, cryptographically random nonce per request. Templates
//! put it on `<script nonce="...">` tags and [`content_security_policy`]
//! allows exactly that nonce.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Hosts the browser may be sent to after a form post.
///
/// Checkout posts redirect straight to the provider's hosted payment page,
/// and browsers apply `form-action` to that redirect.
pub const PAYMENT_FORM_ACTIONS: &[&str] = &[
    "https://pay.payphonetodoenuno.com",
    "https://ppls.me",
    "https://*.mercadopago.com",
    "https://*.mercadopago.com.ec",
    "https://*.mercadolibre.com",
];

/// Script CDN for htmx.
pub const SCRIPT_CDN: &str = "https://unpkg.com";

/// A CSP nonce value for inline scripts (128-bit, base64-encoded).
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    /// Get the nonce value for use in templates.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Middleware that generates a CSP nonce and stores it in request extensions.
///
/// Must run before `security_headers_middleware` so the nonce is available
/// when building the CSP header.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    let nonce = CspNonce::generate();
    request.extensions_mut().insert(nonce.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(nonce);
    response
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!(
                "CSP nonce not found in request extensions - middleware may be misconfigured"
            );
            Self(String::new())
        }))
    }
}

/// Build the storefront CSP for one response.
#[must_use]
pub fn content_security_policy(nonce: Option<&CspNonce>) -> String {
    let script_src = match nonce {
        Some(nonce) if !nonce.value().is_empty() => {
            format!("'self' {SCRIPT_CDN} 'nonce-{}'", nonce.value())
        }
        _ => format!("'self' {SCRIPT_CDN}"),
    };

    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' https: data:; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' {}; \
         frame-ancestors 'none'",
        PAYMENT_FORM_ACTIONS.join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_unique() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();
        assert_ne!(a.value(), b.value());
        assert_eq!(a.value().len(), 24);
    }

    #[test]
    fn test_policy_includes_nonce_and_payment_hosts() {
        let nonce = CspNonce("abc123".to_string());
        let csp = content_security_policy(Some(&nonce));
        assert!(csp.contains("'nonce-abc123'"));
        assert!(csp.contains("https://unpkg.com"));
        assert!(csp.contains("form-action 'self' https://pay.payphonetodoenuno.com"));
        assert!(csp.contains("https://*.mercadopago.com"));
    }

    #[test]
    fn test_policy_without_nonce() {
        let csp = content_security_policy(None);
        assert!(!csp.contains("nonce-"));
        assert!(csp.starts_with("default-src 'none'"));
    }
}
