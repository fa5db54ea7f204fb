//! One-shot flash messages stored in the session.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::models::{Flash, session_keys};

/// The pending flash message, removed from the session on extraction.
pub struct FlashMessage(pub Option<Flash>);

impl<S> FromRequestParts<S> for FlashMessage
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let flash = match parts.extensions.get::<Session>() {
            Some(session) => session
                .remove::<Flash>(session_keys::FLASH)
                .await
                .ok()
                .flatten(),
            None => None,
        };
        Ok(Self(flash))
    }
}

/// Queue a flash message for the next page.
pub async fn set_flash(session: &Session, flash: Flash) {
    if let Err(e) = session.insert(session_keys::FLASH, flash).await {
        tracing::warn!("Failed to store flash message: {e}");
    }
}
