//! User administration.

use reqwest::Method;
use secrecy::SecretString;
use serde::Serialize;
use tienda_core::models::{Page, User};
use tienda_core::{UserId, UserRole};
use tracing::instrument;

use crate::{BackendClient, BackendError};

#[derive(Serialize)]
struct RoleUpdate {
    role: UserRole,
}

#[derive(Serialize)]
struct ActiveUpdate {
    active: bool,
}

impl BackendClient {
    /// List users (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn list_users(
        &self,
        token: &SecretString,
        page: u32,
    ) -> Result<Page<User>, BackendError> {
        let mut url = self.url("/users")?;
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string());
        self.send(self.request(Method::GET, url, Some(token))).await
    }

    /// Change a user's role (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(user_id = %id, role = %role))]
    pub async fn update_user_role(
        &self,
        token: &SecretString,
        id: UserId,
        role: UserRole,
    ) -> Result<User, BackendError> {
        let url = self.url(&format!("/users/{id}/role"))?;
        self.send(
            self.request(Method::PUT, url, Some(token))
                .json(&RoleUpdate { role }),
        )
        .await
    }

    /// Activate or deactivate a user (admin only).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(user_id = %id))]
    pub async fn set_user_active(
        &self,
        token: &SecretString,
        id: UserId,
        active: bool,
    ) -> Result<User, BackendError> {
        let url = self.url(&format!("/users/{id}/active"))?;
        self.send(
            self.request(Method::PUT, url, Some(token))
                .json(&ActiveUpdate { active }),
        )
        .await
    }
}
