//! Authentication route handlers for admin.
//!
//! Credentials are checked by the commerce backend. Only backend users with
//! the admin role get an admin session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tienda_backend::BackendError;
use tienda_core::models::AuthSession;
use tienda_core::{Email, UserRole};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAdminAuth, PageContext, clear_current_admin, set_current_admin, set_flash,
};
use crate::models::{CurrentAdmin, Flash};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Query parameters for the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    /// Set when the backend rejected the session's token.
    pub expired: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub error: Option<String>,
}

/// Turn a backend login into an admin session, if the account may enter.
fn admin_from_login(auth: AuthSession) -> std::result::Result<CurrentAdmin, &'static str> {
    if auth.user.role != UserRole::Admin {
        return Err("This account does not have admin access.");
    }
    if !auth.user.active {
        return Err("This account has been deactivated.");
    }
    Ok(CurrentAdmin {
        id: auth.user.id,
        email: auth.user.email,
        name: auth.user.name,
        token: SecretString::from(auth.token),
    })
}

/// Render the login page.
///
/// GET /auth/login
pub async fn login_page(
    OptionalAdminAuth(admin): OptionalAdminAuth,
    session: Session,
    ctx: PageContext,
    Query(query): Query<LoginPageQuery>,
) -> Response {
    let error = if query.expired.is_some() {
        if admin.is_some() {
            if let Err(e) = clear_current_admin(&session).await {
                tracing::warn!("Failed to clear expired admin session: {e}");
            }
            clear_sentry_user();
        }
        Some("Your session has expired. Please sign in again.".to_string())
    } else if admin.is_some() {
        return Redirect::to("/").into_response();
    } else {
        None
    };

    LoginTemplate {
        ctx,
        email: admin.map(|a| a.email.to_string()).unwrap_or_default(),
        error,
    }
    .into_response()
}

/// Check credentials against the backend.
///
/// POST /auth/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let render = |ctx, error: &str| {
        LoginTemplate {
            ctx,
            email: form.email.clone(),
            error: Some(error.to_string()),
        }
        .into_response()
    };

    let Ok(email) = Email::parse(&form.email) else {
        return Ok(render(ctx, INVALID_CREDENTIALS));
    };
    let password = SecretString::from(form.password.clone());

    let auth = match state.backend().login(&email, &password).await {
        Ok(auth) => auth,
        Err(BackendError::Unauthorized(_)) => return Ok(render(ctx, INVALID_CREDENTIALS)),
        Err(e) => {
            tracing::warn!(error = %e, "Admin login failed");
            return Ok(render(ctx, &e.user_message()));
        }
    };

    let user_id = auth.user.id;
    let admin = match admin_from_login(auth) {
        Ok(admin) => admin,
        Err(reason) => {
            tracing::warn!(user_id = %user_id, reason, "Admin login refused");
            return Ok(render(ctx, reason));
        }
    };

    set_current_admin(&session, &admin).await?;
    set_sentry_user(&admin.id, Some(admin.email.as_str()));
    tracing::info!(user_id = %admin.id, "Admin signed in");

    set_flash(&session, Flash::success(format!("Welcome back, {}.", admin.name))).await;
    Ok(Redirect::to("/").into_response())
}

/// Logout and clear session.
///
/// POST /auth/logout
pub async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_admin(&session).await {
        tracing::warn!("Failed to clear admin session: {e}");
    }
    clear_sentry_user();
    Redirect::to("/auth/login")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tienda_core::UserId;
    use tienda_core::models::User;

    fn login_as(role: UserRole, active: bool) -> AuthSession {
        AuthSession {
            token: "tok".to_string(),
            user: User {
                id: UserId::new(3),
                name: "Marta".to_string(),
                email: Email::parse("marta@tienda.ec").unwrap(),
                role,
                active,
                created_at: None,
            },
        }
    }

    #[test]
    fn test_only_active_admins_get_a_session() {
        let admin = admin_from_login(login_as(UserRole::Admin, true)).unwrap();
        assert_eq!(admin.id, UserId::new(3));
        assert_eq!(admin.token.expose_secret(), "tok");

        assert!(admin_from_login(login_as(UserRole::Customer, true)).is_err());
        assert_eq!(
            admin_from_login(login_as(UserRole::Admin, false)).unwrap_err(),
            "This account has been deactivated."
        );
    }
}
