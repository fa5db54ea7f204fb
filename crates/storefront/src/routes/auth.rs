//! Authentication route handlers.
//!
//! Credentials are checked by the commerce backend; the bearer token it
//! returns is kept in the session as part of [`CurrentCustomer`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tienda_backend::BackendError;
use tienda_core::Email;
use tienda_core::models::AuthSession;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    PageContext, clear_current_customer, set_current_customer, set_flash, take_return_to,
};
use crate::models::{CurrentCustomer, Flash};
use crate::state::AppState;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegisterForm {
    fn validate(&self) -> std::result::Result<Email, String> {
        if self.name.trim().is_empty() {
            return Err("Please enter your name.".to_string());
        }
        let email = Email::parse(&self.email).map_err(|e| format!("Invalid email: {e}."))?;
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters."
            ));
        }
        if self.password != self.password_confirm {
            return Err("Passwords do not match.".to_string());
        }
        Ok(email)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub name: String,
    pub email: String,
    pub error: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Store a backend login in the session and pick where to go next.
async fn sign_in(session: &Session, auth: AuthSession) -> Result<Response> {
    let customer = CurrentCustomer {
        id: auth.user.id,
        name: auth.user.name,
        email: auth.user.email,
        token: SecretString::from(auth.token),
    };
    let return_to = take_return_to(session).await;
    set_current_customer(session, &customer).await?;
    set_sentry_user(&customer.id, Some(customer.email.as_str()));
    tracing::info!(user_id = %customer.id, "Customer signed in");

    set_flash(session, Flash::success(format!("Welcome, {}!", customer.name))).await;
    Ok(Redirect::to(return_to.as_deref().unwrap_or("/")).into_response())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: PageContext) -> impl IntoResponse {
    LoginTemplate {
        ctx,
        email: String::new(),
        error: None,
    }
}

/// Handle login form submission.
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
        return Ok(render(ctx, "Invalid email or password."));
    };
    let password = SecretString::from(form.password.clone());

    match state.backend().login(&email, &password).await {
        Ok(auth) if !auth.user.active => Ok(render(ctx, "This account has been deactivated.")),
        Ok(auth) => sign_in(&session, auth).await,
        Err(BackendError::Unauthorized(_)) => Ok(render(ctx, "Invalid email or password.")),
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            Ok(render(ctx, &e.user_message()))
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: PageContext) -> impl IntoResponse {
    RegisterTemplate {
        ctx,
        name: String::new(),
        email: String::new(),
        error: None,
    }
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let render = |ctx, error: String| {
        RegisterTemplate {
            ctx,
            name: form.name.clone(),
            email: form.email.clone(),
            error: Some(error),
        }
        .into_response()
    };

    let email = match form.validate() {
        Ok(email) => email,
        Err(error) => return Ok(render(ctx, error)),
    };
    let password = SecretString::from(form.password.clone());

    match state
        .backend()
        .register(form.name.trim(), &email, &password)
        .await
    {
        Ok(auth) => sign_in(&session, auth).await,
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            Ok(render(ctx, e.user_message()))
        }
    }
}

/// Log out. The cart is kept.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_customer(&session).await?;
    clear_sentry_user();
    set_flash(&session, Flash::info("You have been signed out.")).await;
    Ok(Redirect::to("/").into_response())
}
