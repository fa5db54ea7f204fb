//! Admin session extractors.
//!
//! The session only ever holds a [`CurrentAdmin`] written by the login
//! handler after the backend confirmed the account has the admin role, so
//! the extractors trust it. The backend re-checks the bearer token on every
//! call; a revoked token surfaces as `BackendError::Unauthorized`.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentAdmin, session_keys};

/// Signed-in admin, or a redirect to `/auth/login`.
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Signed-in admin, if any. Never rejects.
pub struct OptionalAdminAuth(pub Option<CurrentAdmin>);

#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthRejection {
    NotSignedIn,
    /// The session layer is missing from the router.
    NoSession,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotSignedIn => Redirect::to("/auth/login").into_response(),
            Self::NoSession => {
                tracing::error!("Admin route mounted without a session layer");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn session_admin(parts: &Parts) -> Result<Option<CurrentAdmin>, AdminAuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AdminAuthRejection::NoSession)?;

    match session.get::<CurrentAdmin>(session_keys::CURRENT_ADMIN).await {
        Ok(admin) => Ok(admin),
        Err(e) => {
            // Unreadable session data (e.g. an older format) counts as signed out.
            tracing::debug!(error = %e, "Discarding unreadable admin session");
            Ok(None)
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_admin(parts)
            .await?
            .map(Self)
            .ok_or(AdminAuthRejection::NotSignedIn)
    }
}

impl<S> FromRequestParts<S> for OptionalAdminAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_admin(parts).await.ok().flatten()))
    }
}

/// Start an admin session. The session ID is rotated first so a
/// pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// End the admin session, dropping the backend token with it.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use secrecy::SecretString;
    use tienda_core::{Email, UserId};
    use tower_sessions::MemoryStore;

    use super::*;

    fn admin() -> CurrentAdmin {
        CurrentAdmin {
            id: UserId::new(7),
            email: Email::parse("ops@tienda.ec").unwrap(),
            name: "Ops".to_string(),
            token: SecretString::from("tok".to_string()),
        }
    }

    fn parts_with(session: Option<Session>) -> Parts {
        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_require_admin_reads_session() {
        let session = session();
        set_current_admin(&session, &admin()).await.unwrap();

        let mut parts = parts_with(Some(session));
        let RequireAdminAuth(found) = RequireAdminAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found.id, UserId::new(7));
    }

    #[tokio::test]
    async fn test_require_admin_rejects_anonymous_and_cleared_sessions() {
        let mut parts = parts_with(Some(session()));
        assert_eq!(
            RequireAdminAuth::from_request_parts(&mut parts, &())
                .await
                .err(),
            Some(AdminAuthRejection::NotSignedIn)
        );

        let session = session();
        set_current_admin(&session, &admin()).await.unwrap();
        clear_current_admin(&session).await.unwrap();
        let mut parts = parts_with(Some(session));
        let OptionalAdminAuth(found) = OptionalAdminAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_missing_session_layer_is_a_server_error() {
        let mut parts = parts_with(None);
        let rejection = RequireAdminAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
