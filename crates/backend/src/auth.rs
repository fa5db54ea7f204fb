//! Customer and admin authentication.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tienda_core::Email;
use tienda_core::models::{AuthSession, User};
use tracing::instrument;

use crate::{BackendClient, BackendError};

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

impl BackendClient {
    /// Exchange credentials for a session token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for bad credentials, or an error if the API
    /// request fails.
    #[instrument(skip(self, password), fields(email = %email.masked()))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let url = self.url("/auth/login")?;
        let body = LoginRequest {
            email: email.as_str(),
            password: password.expose_secret(),
        };
        self.send(self.request(Method::POST, url, None).json(&body))
            .await
    }

    /// Create a customer account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `Api` when the backend rejects the registration (e.g. the
    /// email is taken), or an error if the API request fails.
    #[instrument(skip(self, password), fields(email = %email.masked()))]
    pub async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let url = self.url("/auth/register")?;
        let body = RegisterRequest {
            name,
            email: email.as_str(),
            password: password.expose_secret(),
        };
        self.send(self.request(Method::POST, url, None).json(&body))
            .await
    }

    /// The user a token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token expired, or an error if the API
    /// request fails.
    #[instrument(skip(self, token))]
    pub async fn me(&self, token: &SecretString) -> Result<User, BackendError> {
        let url = self.url("/auth/me")?;
        self.send(self.request(Method::GET, url, Some(token))).await
    }
}
